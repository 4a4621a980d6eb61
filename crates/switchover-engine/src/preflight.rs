//! Preflight validation of a hub pair
//!
//! [`PreflightValidator::run_checks`] evaluates the whole checklist against
//! both hubs and never short-circuits: a critical failure early in the list
//! still lets every later check run, so the report is always complete. A
//! check that hits a client error records a failed result carrying the error
//! text instead of aborting the checklist.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use switchover_common::acm::{
    self, ACM_NAMESPACE, BACKUP_NAMESPACE, BACKUP_SCHEDULE, MANAGED_CLUSTER, MULTICLUSTERHUB,
    OBSERVABILITY_NAMESPACE, PASSIVE_SYNC_RESTORE, RESTORE,
};
use switchover_common::version::is_acm_version_ge;
use switchover_common::ClusterClient;

use crate::config::SwitchoverMethod;

/// Outcome of one preflight check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheckResult {
    /// Check name (e.g., "acm_version_match")
    pub check: String,
    /// Whether the check passed
    pub passed: bool,
    /// Human-readable outcome
    pub message: String,
    /// Whether a failure blocks the switchover
    pub critical: bool,
}

/// Runs the preflight checklist against a primary and a secondary hub
#[derive(Debug)]
pub struct PreflightValidator {
    primary: ClusterClient,
    secondary: ClusterClient,
    method: SwitchoverMethod,
    results: Vec<ValidationCheckResult>,
}

impl PreflightValidator {
    /// Create a validator with an empty report
    pub fn new(primary: ClusterClient, secondary: ClusterClient, method: SwitchoverMethod) -> Self {
        Self {
            primary,
            secondary,
            method,
            results: Vec::new(),
        }
    }

    /// Append a check result
    pub fn add_result(
        &mut self,
        check: impl Into<String>,
        passed: bool,
        message: impl Into<String>,
        critical: bool,
    ) {
        let result = ValidationCheckResult {
            check: check.into(),
            passed,
            message: message.into(),
            critical,
        };
        if result.passed {
            info!(check = %result.check, "{}", result.message);
        } else if result.critical {
            warn!(check = %result.check, critical = true, "{}", result.message);
        } else {
            warn!(check = %result.check, critical = false, "Warning: {}", result.message);
        }
        self.results.push(result);
    }

    /// Results recorded so far, in order
    pub fn results(&self) -> &[ValidationCheckResult] {
        &self.results
    }

    /// Names of critical checks that failed
    pub fn failed_critical(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.critical && !r.passed)
            .map(|r| r.check.clone())
            .collect()
    }

    /// Whether no critical check failed
    pub fn passed(&self) -> bool {
        !self.results.iter().any(|r| r.critical && !r.passed)
    }

    /// Log the summary and return the overall outcome
    pub fn evaluate(&self) -> bool {
        let passed = self.results.iter().filter(|r| r.passed).count();
        let critical = self.failed_critical().len();
        let warnings = self
            .results
            .iter()
            .filter(|r| !r.critical && !r.passed)
            .count();

        if self.passed() {
            info!(
                passed = passed,
                warnings = warnings,
                total = self.results.len(),
                "Preflight validation passed"
            );
        } else {
            warn!(
                passed = passed,
                critical_failures = critical,
                warnings = warnings,
                total = self.results.len(),
                "Preflight validation failed"
            );
        }
        self.passed()
    }

    /// Run every check, then evaluate
    pub async fn run_checks(&mut self) -> bool {
        let primary = self.primary.clone();
        let secondary = self.secondary.clone();

        for (role, client) in [("primary", &primary), ("secondary", &secondary)] {
            self.check_namespace(role, client, ACM_NAMESPACE, "acm_namespace")
                .await;
        }

        let primary_version = self.check_hub("primary", &primary).await;
        let secondary_version = self.check_hub("secondary", &secondary).await;
        self.check_version_match(primary_version.as_deref(), secondary_version.as_deref());

        for (role, client) in [("primary", &primary), ("secondary", &secondary)] {
            self.check_namespace(role, client, BACKUP_NAMESPACE, "backup_namespace")
                .await;
        }

        self.check_backup_schedule(&primary).await;
        self.check_passive_restore(&secondary).await;
        self.check_managed_clusters(&primary).await;
        self.check_observability(&primary).await;

        self.evaluate()
    }

    async fn check_namespace(
        &mut self,
        role: &str,
        client: &ClusterClient,
        namespace: &str,
        suffix: &str,
    ) {
        let check = format!("{}_{}", role, suffix);
        match client.namespace_exists(namespace).await {
            Ok(true) => self.add_result(
                check,
                true,
                format!("namespace {} exists on {} hub", namespace, role),
                true,
            ),
            Ok(false) => self.add_result(
                check,
                false,
                format!("namespace {} not found on {} hub", namespace, role),
                true,
            ),
            Err(e) => self.add_result(check, false, e.to_string(), true),
        }
    }

    /// Returns the hub's ACM version when a MultiClusterHub was found
    async fn check_hub(&mut self, role: &str, client: &ClusterClient) -> Option<String> {
        let check = format!("{}_multiclusterhub", role);
        match client
            .list_resources(&MULTICLUSTERHUB, Some(ACM_NAMESPACE), None)
            .await
        {
            Ok(hubs) => match hubs.first() {
                Some(mch) => {
                    let version = acm::hub_version(mch).map(str::to_string);
                    self.add_result(
                        check,
                        true,
                        format!(
                            "MultiClusterHub found on {} hub (version {})",
                            role,
                            version.as_deref().unwrap_or("unknown")
                        ),
                        true,
                    );
                    version
                }
                None => {
                    self.add_result(
                        check,
                        false,
                        format!("no MultiClusterHub found on {} hub", role),
                        true,
                    );
                    None
                }
            },
            Err(e) => {
                self.add_result(check, false, e.to_string(), true);
                None
            }
        }
    }

    fn check_version_match(&mut self, primary: Option<&str>, secondary: Option<&str>) {
        match (primary, secondary) {
            (Some(p), Some(s)) if is_acm_version_ge(p, s) && is_acm_version_ge(s, p) => {
                self.add_result(
                    "acm_version_match",
                    true,
                    format!("ACM versions match ({})", p),
                    true,
                )
            }
            (Some(p), Some(s)) => self.add_result(
                "acm_version_match",
                false,
                format!("ACM version mismatch: primary {} vs secondary {}", p, s),
                true,
            ),
            _ => self.add_result(
                "acm_version_match",
                false,
                "ACM version unavailable on at least one hub",
                true,
            ),
        }
    }

    async fn check_backup_schedule(&mut self, primary: &ClusterClient) {
        let check = "primary_backup_schedule";
        match primary
            .list_resources(&BACKUP_SCHEDULE, Some(BACKUP_NAMESPACE), None)
            .await
        {
            Ok(schedules) if !schedules.is_empty() => self.add_result(
                check,
                true,
                format!("{} BackupSchedule(s) found on primary hub", schedules.len()),
                true,
            ),
            Ok(_) => self.add_result(check, false, "no BackupSchedule found on primary hub", true),
            Err(e) => self.add_result(check, false, e.to_string(), true),
        }
    }

    async fn check_passive_restore(&mut self, secondary: &ClusterClient) {
        let check = "secondary_passive_restore";
        let critical = self.method == SwitchoverMethod::Passive;
        match secondary
            .get_resource(&RESTORE, PASSIVE_SYNC_RESTORE, Some(BACKUP_NAMESPACE))
            .await
        {
            Ok(Some(restore)) => self.add_result(
                check,
                true,
                format!(
                    "passive-sync restore found on secondary hub (phase {})",
                    acm::restore_phase(&restore).unwrap_or("unknown")
                ),
                critical,
            ),
            Ok(None) => self.add_result(
                check,
                false,
                format!("restore {} not found on secondary hub", PASSIVE_SYNC_RESTORE),
                critical,
            ),
            Err(e) => self.add_result(check, false, e.to_string(), critical),
        }
    }

    async fn check_managed_clusters(&mut self, primary: &ClusterClient) {
        let check = "primary_managed_clusters";
        match primary.list_resources(&MANAGED_CLUSTER, None, None).await {
            Ok(clusters) => {
                let count = acm::non_local_clusters(&clusters).len();
                if count > 0 {
                    self.add_result(
                        check,
                        true,
                        format!("{} managed cluster(s) on primary hub", count),
                        false,
                    );
                } else {
                    self.add_result(check, false, "no managed clusters on primary hub", false);
                }
            }
            Err(e) => self.add_result(check, false, e.to_string(), false),
        }
    }

    async fn check_observability(&mut self, primary: &ClusterClient) {
        match primary.namespace_exists(OBSERVABILITY_NAMESPACE).await {
            Ok(true) => self.add_result("observability", true, "observability detected", false),
            Ok(false) => {
                self.add_result("observability", true, "observability not installed", false)
            }
            Err(e) => self.add_result("observability", false, e.to_string(), false),
        }
    }
}
