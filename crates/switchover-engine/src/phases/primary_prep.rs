use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use switchover_common::acm::{
    self, BACKUP_NAMESPACE, BACKUP_SCHEDULE, DISABLE_AUTO_IMPORT_ANNOTATION, MANAGED_CLUSTER,
    OBSERVABILITY_NAMESPACE, THANOS_COMPACT,
};
use switchover_common::Result;

use super::{observability_present, Phase, PhaseContext, PhaseHandler};

/// Quiesces the outgoing primary.
///
/// Pauses its BackupSchedule so it stops writing backups, stops it from
/// re-importing managed clusters, and stops the observability compactor so
/// only one hub compacts the shared metrics bucket.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryPrepPhase;

#[async_trait]
impl PhaseHandler for PrimaryPrepPhase {
    fn phase(&self) -> Phase {
        Phase::PrimaryPrep
    }

    async fn run(&self, ctx: &PhaseContext) -> Result<()> {
        let primary = &ctx.primary;

        let schedules = primary
            .list_resources(&BACKUP_SCHEDULE, Some(BACKUP_NAMESPACE), None)
            .await?;
        if schedules.is_empty() {
            warn!(context = %primary.context(), "No BackupSchedule to pause on primary hub");
        }
        for name in schedules.iter().filter_map(acm::object_name) {
            primary
                .patch_resource(
                    &BACKUP_SCHEDULE,
                    name,
                    Some(BACKUP_NAMESPACE),
                    &acm::backup_schedule_paused_patch(true),
                )
                .await?;
            info!(context = %primary.context(), schedule = %name, "Paused BackupSchedule");
        }

        let clusters = primary.list_resources(&MANAGED_CLUSTER, None, None).await?;
        let patch = json!({"metadata": {"annotations": {DISABLE_AUTO_IMPORT_ANNOTATION: ""}}});
        let mut annotated = 0;
        for name in acm::non_local_clusters(&clusters)
            .into_iter()
            .filter_map(acm::object_name)
        {
            primary
                .patch_resource(&MANAGED_CLUSTER, name, None, &patch)
                .await?;
            annotated += 1;
        }
        info!(
            context = %primary.context(),
            clusters = annotated,
            "Disabled auto-import on managed clusters"
        );

        if observability_present(primary).await? {
            primary
                .scale_statefulset(OBSERVABILITY_NAMESPACE, THANOS_COMPACT, 0)
                .await?;
            info!(context = %primary.context(), "Scaled down observability compactor");
        }

        Ok(())
    }
}
