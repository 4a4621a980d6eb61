use async_trait::async_trait;
use tracing::info;

use switchover_common::acm::{
    self, ACM_NAMESPACE, BACKUP_NAMESPACE, BACKUP_SCHEDULE, FULL_RESTORE, MULTICLUSTERHUB,
    PASSIVE_SYNC_RESTORE, RESTORE,
};
use switchover_common::{ClusterClient, Result};

use super::{Phase, PhaseContext, PhaseHandler};
use crate::config::OldHubAction;

/// Starts backups on the new primary and applies the old hub disposition
#[derive(Debug, Default, Clone, Copy)]
pub struct FinalizationPhase;

async fn resume_backups(ctx: &PhaseContext, hub: &ClusterClient) -> Result<()> {
    let schedules = hub
        .list_resources(&BACKUP_SCHEDULE, Some(BACKUP_NAMESPACE), None)
        .await?;

    if schedules.is_empty() {
        let body = acm::backup_schedule();
        hub.create_resource(&BACKUP_SCHEDULE, BACKUP_NAMESPACE, &body)
            .await?;
        ctx.record_manifest("backup_schedule", &body);
        info!(context = %hub.context(), "Created BackupSchedule on new primary");
        return Ok(());
    }

    for name in schedules.iter().filter_map(acm::object_name) {
        hub.patch_resource(
            &BACKUP_SCHEDULE,
            name,
            Some(BACKUP_NAMESPACE),
            &acm::backup_schedule_paused_patch(false),
        )
        .await?;
        info!(context = %hub.context(), schedule = %name, "Resumed BackupSchedule");
    }
    Ok(())
}

async fn make_passive(ctx: &PhaseContext, old_hub: &ClusterClient) -> Result<()> {
    if old_hub
        .delete_resource(&RESTORE, FULL_RESTORE, Some(BACKUP_NAMESPACE))
        .await?
    {
        info!(context = %old_hub.context(), "Removed full restore from old hub");
    }

    if let Some(existing) = old_hub
        .get_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE))
        .await?
    {
        if acm::is_passive_sync_restore(&existing) {
            info!(context = %old_hub.context(), "Passive-sync restore already present on old hub");
            return Ok(());
        }
        // Activated restores are not re-armed in place
        old_hub
            .delete_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE))
            .await?;
        info!(context = %old_hub.context(), "Removed activated restore from old hub");
    }

    let body = acm::passive_sync_restore();
    old_hub
        .create_resource(&RESTORE, BACKUP_NAMESPACE, &body)
        .await?;
    ctx.record_manifest("old_hub_passive_restore", &body);
    info!(context = %old_hub.context(), "Old hub is now a passive secondary");
    Ok(())
}

async fn decommission(old_hub: &ClusterClient) -> Result<()> {
    let hubs = old_hub
        .list_resources(&MULTICLUSTERHUB, Some(ACM_NAMESPACE), None)
        .await?;
    for name in hubs.iter().filter_map(acm::object_name) {
        old_hub
            .delete_resource(&MULTICLUSTERHUB, name, Some(ACM_NAMESPACE))
            .await?;
        info!(context = %old_hub.context(), hub = %name, "Deleted MultiClusterHub on old hub");
    }
    Ok(())
}

#[async_trait]
impl PhaseHandler for FinalizationPhase {
    fn phase(&self) -> Phase {
        Phase::Finalization
    }

    async fn run(&self, ctx: &PhaseContext) -> Result<()> {
        resume_backups(ctx, &ctx.secondary).await?;

        match ctx.config.old_hub_action {
            OldHubAction::Secondary => make_passive(ctx, &ctx.primary).await,
            OldHubAction::Decommission => decommission(&ctx.primary).await,
            OldHubAction::None => {
                info!(context = %ctx.primary.context(), "Leaving old hub untouched");
                Ok(())
            }
        }
    }
}
