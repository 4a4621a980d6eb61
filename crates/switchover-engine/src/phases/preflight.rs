use async_trait::async_trait;

use switchover_common::{Error, Result};

use super::{Phase, PhaseContext, PhaseHandler};
use crate::preflight::PreflightValidator;

/// Runs the preflight checklist and fails on any critical failure
#[derive(Debug, Default, Clone, Copy)]
pub struct PreflightPhase;

#[async_trait]
impl PhaseHandler for PreflightPhase {
    fn phase(&self) -> Phase {
        Phase::Preflight
    }

    async fn run(&self, ctx: &PhaseContext) -> Result<()> {
        let mut validator = PreflightValidator::new(
            ctx.primary.clone(),
            ctx.secondary.clone(),
            ctx.config.method,
        );

        if validator.run_checks().await {
            return Ok(());
        }

        let failed = validator.failed_critical();
        Err(Error::validation_with_checks(
            format!(
                "{} critical preflight check(s) failed: {}",
                failed.len(),
                failed.join(", ")
            ),
            failed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{healthy_hub, phase_context};
    use switchover_common::acm::{ACM_NAMESPACE, MULTICLUSTERHUB};

    #[tokio::test]
    async fn test_preflight_passes_on_healthy_hubs() {
        let ctx = phase_context(healthy_hub("2.11.0"), healthy_hub("2.11.0"), |c| c);
        let result = PreflightPhase.execute(&ctx).await;
        assert!(result.success, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_preflight_fails_with_check_names() {
        let secondary = healthy_hub("2.11.0");
        secondary.remove(&MULTICLUSTERHUB, Some(ACM_NAMESPACE), "multiclusterhub");

        let ctx = phase_context(healthy_hub("2.11.0"), secondary, |c| c);
        let result = PreflightPhase.execute(&ctx).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("secondary_multiclusterhub"));
        assert!(error.contains("acm_version_match"));
    }
}
