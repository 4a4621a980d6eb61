use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use switchover_common::acm::{self, BACKUP_NAMESPACE, FULL_RESTORE, PASSIVE_SYNC_RESTORE, RESTORE};
use switchover_common::waiter::{wait_for_condition, Progress, WaitOptions};
use switchover_common::{ClusterClient, Error, Result};

use super::{Phase, PhaseContext, PhaseHandler};
use crate::config::SwitchoverMethod;

/// Restores settle quickly or not at all; poll fast for the first minute
const RESTORE_FAST_INTERVAL: Duration = Duration::from_secs(5);
const RESTORE_FAST_WINDOW: Duration = Duration::from_secs(60);

/// Promotes the secondary hub by restoring the latest managed-cluster backup
#[derive(Debug, Default, Clone, Copy)]
pub struct ActivationPhase;

impl ActivationPhase {
    /// Returns the name of the restore that performs the activation
    async fn submit_restore(&self, ctx: &PhaseContext) -> Result<&'static str> {
        let secondary = &ctx.secondary;

        match ctx.config.method {
            SwitchoverMethod::Passive => {
                if secondary
                    .get_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE))
                    .await?
                    .is_none()
                {
                    return Err(Error::fatal_for(
                        secondary.context(),
                        format!("restore {} not found", PASSIVE_SYNC_RESTORE),
                    ));
                }
                let patch = acm::activate_passive_restore_patch();
                secondary
                    .patch_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE), &patch)
                    .await?;
                ctx.record_manifest("activation_restore_patch", &patch);
                info!(context = %secondary.context(), restore = PASSIVE_SYNC_RESTORE, "Activated passive-sync restore");
                Ok(PASSIVE_SYNC_RESTORE)
            }
            SwitchoverMethod::Active => {
                if secondary
                    .delete_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE))
                    .await?
                {
                    info!(context = %secondary.context(), "Removed passive-sync restore");
                }
                if secondary
                    .delete_resource(&RESTORE, FULL_RESTORE, Some(BACKUP_NAMESPACE))
                    .await?
                {
                    info!(context = %secondary.context(), "Removed full restore left by an earlier cycle");
                }
                let body = acm::full_restore();
                secondary
                    .create_resource(&RESTORE, BACKUP_NAMESPACE, &body)
                    .await?;
                ctx.record_manifest("activation_restore", &body);
                info!(context = %secondary.context(), restore = FULL_RESTORE, "Created full restore");
                Ok(FULL_RESTORE)
            }
        }
    }
}

async fn probe_restore(client: &ClusterClient, name: &str) -> Result<Progress> {
    let Some(restore) = client
        .get_resource(&RESTORE, name, Some(BACKUP_NAMESPACE))
        .await?
    else {
        return Ok(Progress::pending("restore not found yet"));
    };

    match acm::restore_phase(&restore) {
        Some(phase) if acm::is_restore_finished(phase) => Ok(Progress::done(phase)),
        Some(phase) if acm::is_restore_failed(phase) => Err(Error::fatal_for(
            client.context(),
            format!("restore {} ended in phase {}", name, phase),
        )),
        Some(phase) => Ok(Progress::pending(phase)),
        None => Ok(Progress::pending("no status yet")),
    }
}

#[async_trait]
impl PhaseHandler for ActivationPhase {
    fn phase(&self) -> Phase {
        Phase::Activation
    }

    async fn run(&self, ctx: &PhaseContext) -> Result<()> {
        let name = self.submit_restore(ctx).await?;

        if ctx.dry_run() {
            info!(restore = name, "[DRY-RUN] Skipping wait for restore to finish");
            return Ok(());
        }

        let timeouts = &ctx.config.timeouts;
        let options = WaitOptions::new(timeouts.restore(), timeouts.poll_interval())
            .with_fast_polling(RESTORE_FAST_INTERVAL, Some(RESTORE_FAST_WINDOW));
        let description = format!("restore {} on {}", name, ctx.secondary.context());

        let finished =
            wait_for_condition(&description, &options, || probe_restore(&ctx.secondary, name))
                .await?;
        if !finished {
            return Err(Error::fatal_for(
                ctx.secondary.context(),
                format!(
                    "restore {} did not finish within {}s",
                    name, timeouts.restore_seconds
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{healthy_hub, phase_context};
    use serde_json::json;

    #[tokio::test]
    async fn test_passive_activation_patches_restore_and_records_manifest() {
        let secondary = healthy_hub("2.11.0");
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = phase_context(healthy_hub("2.11.0"), secondary.clone(), |c| c);
        ctx.manifests_dir = Some(dir.path().to_path_buf());

        let result = ActivationPhase.execute(&ctx).await;
        assert!(result.success, "{:?}", result.error);

        let restore = secondary
            .object(&RESTORE, Some(BACKUP_NAMESPACE), PASSIVE_SYNC_RESTORE)
            .unwrap();
        assert_eq!(restore["spec"]["veleroManagedClustersBackupName"], "latest");
        assert!(dir.path().join("cycle_001_activation_restore_patch.json").exists());
    }

    #[tokio::test]
    async fn test_active_activation_creates_full_restore() {
        let secondary = healthy_hub("2.11.0");
        let ctx = phase_context(healthy_hub("2.11.0"), secondary.clone(), |c| {
            c.with_method(SwitchoverMethod::Active)
        });

        let result = ActivationPhase.execute(&ctx).await;
        assert!(result.success, "{:?}", result.error);
        assert!(secondary
            .object(&RESTORE, Some(BACKUP_NAMESPACE), FULL_RESTORE)
            .is_some());
        assert!(secondary
            .object(&RESTORE, Some(BACKUP_NAMESPACE), PASSIVE_SYNC_RESTORE)
            .is_none());
    }

    #[tokio::test]
    async fn test_active_activation_replaces_leftover_full_restore() {
        let secondary = healthy_hub("2.11.0");
        let mut leftover = acm::full_restore();
        leftover["status"] = json!({"phase": "FinishedWithErrors"});
        secondary.insert(&RESTORE, Some(BACKUP_NAMESPACE), leftover);
        let ctx = phase_context(healthy_hub("2.11.0"), secondary.clone(), |c| {
            c.with_method(SwitchoverMethod::Active)
        });

        let result = ActivationPhase.execute(&ctx).await;
        assert!(result.success, "{:?}", result.error);

        let restore = secondary
            .object(&RESTORE, Some(BACKUP_NAMESPACE), FULL_RESTORE)
            .unwrap();
        assert_eq!(acm::restore_phase(&restore), Some("Finished"));
        assert!(secondary
            .mutations()
            .iter()
            .any(|m| m.starts_with("delete ") && m.contains(FULL_RESTORE)));
    }

    #[tokio::test]
    async fn test_restore_failure_fails_phase() {
        let secondary = healthy_hub("2.11.0");
        secondary.set_status(
            &RESTORE,
            Some(BACKUP_NAMESPACE),
            PASSIVE_SYNC_RESTORE,
            json!({"phase": "FinishedWithErrors"}),
        );
        let ctx = phase_context(healthy_hub("2.11.0"), secondary, |c| c);

        let result = ActivationPhase.execute(&ctx).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("FinishedWithErrors"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_timeout_fails_phase() {
        let secondary = healthy_hub("2.11.0");
        secondary.set_status(
            &RESTORE,
            Some(BACKUP_NAMESPACE),
            PASSIVE_SYNC_RESTORE,
            json!({"phase": "Running"}),
        );
        let ctx = phase_context(healthy_hub("2.11.0"), secondary, |c| c);

        let result = ActivationPhase.execute(&ctx).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("did not finish"));
    }

    #[tokio::test]
    async fn test_dry_run_skips_wait_and_mutations() {
        let secondary = healthy_hub("2.11.0");
        // A restore that would never finish must not block a dry run
        secondary.set_status(
            &RESTORE,
            Some(BACKUP_NAMESPACE),
            PASSIVE_SYNC_RESTORE,
            json!({"phase": "Running"}),
        );
        let ctx = phase_context(healthy_hub("2.11.0"), secondary.clone(), |c| c.with_dry_run(true));

        let result = ActivationPhase.execute(&ctx).await;
        assert!(result.success, "{:?}", result.error);
        assert!(secondary.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_passive_restore_fails() {
        let secondary = healthy_hub("2.11.0");
        secondary.remove(&RESTORE, Some(BACKUP_NAMESPACE), PASSIVE_SYNC_RESTORE);
        let ctx = phase_context(healthy_hub("2.11.0"), secondary, |c| c);

        let result = ActivationPhase.execute(&ctx).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }
}
