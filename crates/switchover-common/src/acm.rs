//! ACM namespaces, resource kinds and manifest builders

use serde_json::{json, Value};

use crate::client::has_true_condition;
use crate::transport::ResourceKind;

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace of the MultiClusterHub operator
pub const ACM_NAMESPACE: &str = "open-cluster-management";

/// Namespace of the cluster-backup operator (BackupSchedule, Restore)
pub const BACKUP_NAMESPACE: &str = "open-cluster-management-backup";

/// Namespace created when multicluster observability is installed
pub const OBSERVABILITY_NAMESPACE: &str = "open-cluster-management-observability";

// =============================================================================
// Object names
// =============================================================================

/// The hub's self-managed cluster, never moved between hubs
pub const LOCAL_CLUSTER: &str = "local-cluster";

/// Annotation that stops a hub from re-importing a managed cluster
pub const DISABLE_AUTO_IMPORT_ANNOTATION: &str = "import.open-cluster-management.io/disable-auto-import";

/// Restore kept running on a passive hub to sync the latest backups
pub const PASSIVE_SYNC_RESTORE: &str = "restore-acm-passive-sync";

/// One-shot restore used by the `active` method
pub const FULL_RESTORE: &str = "restore-acm-full";

/// BackupSchedule created by the cluster-backup operator
pub const BACKUP_SCHEDULE_NAME: &str = "schedule-rhacm";

/// Observability compactor statefulset
pub const THANOS_COMPACT: &str = "observability-thanos-compact";

/// Observability API deployment
pub const OBSERVATORIUM_API: &str = "observability-observatorium-api";

/// Label selector for the observability API pods
pub const OBSERVATORIUM_API_SELECTOR: &str = "app.kubernetes.io/name=observatorium-api";

/// Condition reported by a ManagedCluster once its agent is connected
pub const MANAGED_CLUSTER_AVAILABLE: &str = "ManagedClusterConditionAvailable";

// =============================================================================
// Resource kinds
// =============================================================================

/// operator.open-cluster-management.io/v1 MultiClusterHub
pub const MULTICLUSTERHUB: ResourceKind = ResourceKind::new(
    "operator.open-cluster-management.io",
    "v1",
    "MultiClusterHub",
    "multiclusterhubs",
);

/// cluster.open-cluster-management.io/v1 ManagedCluster (cluster-scoped)
pub const MANAGED_CLUSTER: ResourceKind = ResourceKind::new(
    "cluster.open-cluster-management.io",
    "v1",
    "ManagedCluster",
    "managedclusters",
);

/// cluster.open-cluster-management.io/v1beta1 BackupSchedule
pub const BACKUP_SCHEDULE: ResourceKind = ResourceKind::new(
    "cluster.open-cluster-management.io",
    "v1beta1",
    "BackupSchedule",
    "backupschedules",
);

/// cluster.open-cluster-management.io/v1beta1 Restore
pub const RESTORE: ResourceKind = ResourceKind::new(
    "cluster.open-cluster-management.io",
    "v1beta1",
    "Restore",
    "restores",
);

/// core/v1 Namespace
pub const NAMESPACE: ResourceKind = ResourceKind::new("", "v1", "Namespace", "namespaces");

/// core/v1 Pod
pub const POD: ResourceKind = ResourceKind::new("", "v1", "Pod", "pods");

// =============================================================================
// Manifests
// =============================================================================

fn restore(name: &str, managed_clusters_backup: &str, sync: bool) -> Value {
    let mut spec = json!({
        "cleanupBeforeRestore": "CleanupRestored",
        "veleroManagedClustersBackupName": managed_clusters_backup,
        "veleroCredentialsBackupName": "latest",
        "veleroResourcesBackupName": "latest",
    });
    if sync {
        spec["syncRestoreWithNewBackups"] = json!(true);
        spec["restoreSyncInterval"] = json!("10m");
    }
    json!({
        "apiVersion": RESTORE.api_version(),
        "kind": RESTORE.kind,
        "metadata": {"name": name, "namespace": BACKUP_NAMESPACE},
        "spec": spec,
    })
}

/// Restore that keeps a passive hub in sync without activating managed clusters
pub fn passive_sync_restore() -> Value {
    restore(PASSIVE_SYNC_RESTORE, "skip", true)
}

/// One-shot restore of all backups including managed clusters
pub fn full_restore() -> Value {
    restore(FULL_RESTORE, "latest", false)
}

/// Patch that turns a passive-sync restore into an activating one
pub fn activate_passive_restore_patch() -> Value {
    json!({"spec": {"veleroManagedClustersBackupName": "latest"}})
}

/// Default hourly BackupSchedule
pub fn backup_schedule() -> Value {
    json!({
        "apiVersion": BACKUP_SCHEDULE.api_version(),
        "kind": BACKUP_SCHEDULE.kind,
        "metadata": {"name": BACKUP_SCHEDULE_NAME, "namespace": BACKUP_NAMESPACE},
        "spec": {
            "veleroSchedule": "0 */1 * * *",
            "veleroTtl": "120h",
            "useManagedServiceAccount": true,
        },
    })
}

/// Merge patch setting `spec.paused` on a BackupSchedule
pub fn backup_schedule_paused_patch(paused: bool) -> Value {
    json!({"spec": {"paused": paused}})
}

// =============================================================================
// Status helpers
// =============================================================================

/// `status.phase` of a Restore
pub fn restore_phase(restore: &Value) -> Option<&str> {
    restore.pointer("/status/phase").and_then(Value::as_str)
}

/// Whether a restore phase means the restore completed
pub fn is_restore_finished(phase: &str) -> bool {
    matches!(phase, "Finished" | "Completed")
}

/// Whether a restore phase means the restore will not complete
pub fn is_restore_failed(phase: &str) -> bool {
    matches!(phase, "FinishedWithErrors" | "Failed")
}

/// Whether a Restore still syncs without activating managed clusters
pub fn is_passive_sync_restore(restore: &Value) -> bool {
    restore.pointer("/spec/veleroManagedClustersBackupName") == Some(&json!("skip"))
        && restore.pointer("/spec/syncRestoreWithNewBackups") == Some(&json!(true))
}

/// `status.currentVersion` of a MultiClusterHub
pub fn hub_version(mch: &Value) -> Option<&str> {
    mch.pointer("/status/currentVersion").and_then(Value::as_str)
}

/// Object name from `metadata.name`
pub fn object_name(obj: &Value) -> Option<&str> {
    obj.pointer("/metadata/name").and_then(Value::as_str)
}

/// Managed clusters other than the hub's own `local-cluster`
pub fn non_local_clusters(clusters: &[Value]) -> Vec<&Value> {
    clusters
        .iter()
        .filter(|c| object_name(c).is_some_and(|n| n != LOCAL_CLUSTER))
        .collect()
}

/// Whether a ManagedCluster reports `ManagedClusterConditionAvailable=True`
pub fn is_cluster_available(cluster: &Value) -> bool {
    has_true_condition(cluster, MANAGED_CLUSTER_AVAILABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passive_restore_skips_managed_clusters() {
        let body = passive_sync_restore();
        assert_eq!(body["kind"], "Restore");
        assert_eq!(body["apiVersion"], "cluster.open-cluster-management.io/v1beta1");
        assert_eq!(body["metadata"]["namespace"], BACKUP_NAMESPACE);
        assert_eq!(body["spec"]["veleroManagedClustersBackupName"], "skip");
        assert_eq!(body["spec"]["syncRestoreWithNewBackups"], true);
    }

    #[test]
    fn test_activated_restore_is_no_longer_passive() {
        let mut restore = passive_sync_restore();
        assert!(is_passive_sync_restore(&restore));

        restore["spec"]["veleroManagedClustersBackupName"] = json!("latest");
        assert!(!is_passive_sync_restore(&restore));
        assert!(!is_passive_sync_restore(&full_restore()));
    }

    #[test]
    fn test_full_restore_restores_managed_clusters() {
        let body = full_restore();
        assert_eq!(body["metadata"]["name"], FULL_RESTORE);
        assert_eq!(body["spec"]["veleroManagedClustersBackupName"], "latest");
        assert!(body["spec"].get("syncRestoreWithNewBackups").is_none());
    }

    #[test]
    fn test_restore_phase_helpers() {
        let r = json!({"status": {"phase": "Finished"}});
        assert_eq!(restore_phase(&r), Some("Finished"));
        assert!(is_restore_finished("Finished"));
        assert!(is_restore_finished("Completed"));
        assert!(is_restore_failed("FinishedWithErrors"));
        assert!(!is_restore_failed("Running"));
        assert_eq!(restore_phase(&json!({})), None);
    }

    #[test]
    fn test_non_local_clusters_excludes_local_cluster() {
        let clusters = vec![
            json!({"metadata": {"name": "local-cluster"}}),
            json!({"metadata": {"name": "prod-east"}}),
            json!({"metadata": {"name": "prod-west"}}),
        ];
        let names: Vec<_> = non_local_clusters(&clusters)
            .into_iter()
            .filter_map(object_name)
            .collect();
        assert_eq!(names, vec!["prod-east", "prod-west"]);
    }

    #[test]
    fn test_cluster_available() {
        let available = json!({"status": {"conditions": [
            {"type": "ManagedClusterJoined", "status": "True"},
            {"type": "ManagedClusterConditionAvailable", "status": "True"},
        ]}});
        let unknown = json!({"status": {"conditions": [
            {"type": "ManagedClusterConditionAvailable", "status": "Unknown"},
        ]}});
        assert!(is_cluster_available(&available));
        assert!(!is_cluster_available(&unknown));
        assert!(!is_cluster_available(&json!({})));
    }
}
