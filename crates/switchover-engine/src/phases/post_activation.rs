use async_trait::async_trait;
use tracing::info;

use switchover_common::acm::{
    self, MANAGED_CLUSTER, OBSERVABILITY_NAMESPACE, OBSERVATORIUM_API, OBSERVATORIUM_API_SELECTOR,
    THANOS_COMPACT,
};
use switchover_common::waiter::{wait_for_condition, Progress, WaitOptions};
use switchover_common::{ClusterClient, Error, Result};

use super::{observability_present, Phase, PhaseContext, PhaseHandler};

/// Verifies the new primary: managed clusters reconnect and observability
/// follows the switch
#[derive(Debug, Default, Clone, Copy)]
pub struct PostActivationPhase;

async fn probe_clusters(client: &ClusterClient) -> Result<Progress> {
    let clusters = client.list_resources(&MANAGED_CLUSTER, None, None).await?;
    let managed = acm::non_local_clusters(&clusters);
    if managed.is_empty() {
        return Ok(Progress::done("no managed clusters"));
    }

    let available = managed
        .iter()
        .filter(|c| acm::is_cluster_available(c))
        .count();
    let detail = format!("{}/{} available", available, managed.len());
    Ok(if available == managed.len() {
        Progress::done(detail)
    } else {
        Progress::pending(detail)
    })
}

#[async_trait]
impl PhaseHandler for PostActivationPhase {
    fn phase(&self) -> Phase {
        Phase::PostActivation
    }

    async fn run(&self, ctx: &PhaseContext) -> Result<()> {
        let hub = &ctx.secondary;
        let timeouts = &ctx.config.timeouts;

        if ctx.dry_run() {
            info!(context = %hub.context(), "[DRY-RUN] Skipping wait for managed clusters");
        } else {
            let options = WaitOptions::new(timeouts.clusters_available(), timeouts.poll_interval())
                .allow_success_after_timeout();
            let description = format!("managed clusters on {}", hub.context());
            if !wait_for_condition(&description, &options, || probe_clusters(hub)).await? {
                return Err(Error::fatal_for(
                    hub.context(),
                    format!(
                        "managed clusters not available within {}s",
                        timeouts.clusters_available_seconds
                    ),
                ));
            }
        }

        if !observability_present(hub).await? {
            return Ok(());
        }

        hub.scale_statefulset(OBSERVABILITY_NAMESPACE, THANOS_COMPACT, 1)
            .await?;
        hub.rollout_restart_deployment(OBSERVABILITY_NAMESPACE, OBSERVATORIUM_API)
            .await?;
        info!(context = %hub.context(), "Restarted observatorium API");

        if ctx.dry_run() {
            info!(context = %hub.context(), "[DRY-RUN] Skipping wait for observatorium API pods");
            return Ok(());
        }

        let ready = hub
            .wait_for_pods_ready(
                OBSERVABILITY_NAMESPACE,
                OBSERVATORIUM_API_SELECTOR,
                timeouts.pods_ready(),
            )
            .await?;
        if !ready {
            return Err(Error::fatal_for(
                hub.context(),
                format!(
                    "{} pods not ready within {}s",
                    OBSERVATORIUM_API, timeouts.pods_ready_seconds
                ),
            ));
        }
        Ok(())
    }
}
