//! Run configuration
//!
//! A [`RunConfig`] is fully resolved before a run starts (the CLI maps flags
//! and environment onto it) and never changes while the run is in progress.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use switchover_common::{Error, Result};

/// Default number of switchover cycles per run
pub const DEFAULT_CYCLES: u32 = 5;

/// Default pause between cycles
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 30;

/// How the secondary hub is activated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchoverMethod {
    /// Create a full restore on the secondary hub
    Active,
    /// Activate the secondary's continuously syncing passive restore
    #[default]
    Passive,
}

impl SwitchoverMethod {
    /// Lowercase name used in flags and persisted output
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchoverMethod::Active => "active",
            SwitchoverMethod::Passive => "passive",
        }
    }
}

impl fmt::Display for SwitchoverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchoverMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(SwitchoverMethod::Active),
            "passive" => Ok(SwitchoverMethod::Passive),
            other => Err(Error::configuration_for_field(
                "method",
                format!("unknown switchover method '{}', expected active or passive", other),
            )),
        }
    }
}

/// What happens to the old primary hub after the switchover
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OldHubAction {
    /// Keep it as a passive standby syncing the new primary's backups
    #[default]
    Secondary,
    /// Remove its MultiClusterHub
    Decommission,
    /// Leave it untouched
    None,
}

impl OldHubAction {
    /// Lowercase name used in flags and persisted output
    pub fn as_str(self) -> &'static str {
        match self {
            OldHubAction::Secondary => "secondary",
            OldHubAction::Decommission => "decommission",
            OldHubAction::None => "none",
        }
    }
}

impl fmt::Display for OldHubAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OldHubAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "secondary" => Ok(OldHubAction::Secondary),
            "decommission" => Ok(OldHubAction::Decommission),
            "none" => Ok(OldHubAction::None),
            other => Err(Error::configuration_for_field(
                "old_hub_action",
                format!(
                    "unknown old hub action '{}', expected secondary, decommission or none",
                    other
                ),
            )),
        }
    }
}

/// Budgets for the waits performed inside phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitTimeouts {
    /// Restore reaching `Finished`
    pub restore_seconds: u64,
    /// All managed clusters reporting Available on the new hub
    pub clusters_available_seconds: u64,
    /// Observability pods becoming Ready after a restart
    pub pods_ready_seconds: u64,
    /// Normal poll interval
    pub poll_interval_seconds: u64,
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            restore_seconds: 1800,
            clusters_available_seconds: 900,
            pods_ready_seconds: 300,
            poll_interval_seconds: 30,
        }
    }
}

impl WaitTimeouts {
    /// Restore wait budget
    pub fn restore(&self) -> Duration {
        Duration::from_secs(self.restore_seconds)
    }

    /// Cluster availability wait budget
    pub fn clusters_available(&self) -> Duration {
        Duration::from_secs(self.clusters_available_seconds)
    }

    /// Pod readiness wait budget
    pub fn pods_ready(&self) -> Duration {
        Duration::from_secs(self.pods_ready_seconds)
    }

    /// Normal poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Configuration of one run of repeated switchover cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Kube context of the hub that starts as primary
    pub primary_context: String,
    /// Kube context of the hub that starts as secondary
    pub secondary_context: String,
    /// Activation method
    pub method: SwitchoverMethod,
    /// Disposition of the old primary
    pub old_hub_action: OldHubAction,
    /// Number of cycles to run
    pub cycles: u32,
    /// Suppress all mutations
    pub dry_run: bool,
    /// Stop at the first failed cycle
    pub stop_on_failure: bool,
    /// Pause between cycles
    pub cooldown_seconds: u64,
    /// Parent of the per-run output directory
    pub output_dir: PathBuf,
    /// Directory of per-cycle state files
    pub state_dir: PathBuf,
    /// Deadline for the whole run, honored at phase boundaries
    pub run_timeout_seconds: Option<u64>,
    /// Wait budgets used inside phases
    pub timeouts: WaitTimeouts,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            primary_context: String::new(),
            secondary_context: String::new(),
            method: SwitchoverMethod::default(),
            old_hub_action: OldHubAction::default(),
            cycles: DEFAULT_CYCLES,
            dry_run: false,
            stop_on_failure: false,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            output_dir: PathBuf::from("./e2e-runs"),
            state_dir: PathBuf::from(".state"),
            run_timeout_seconds: None,
            timeouts: WaitTimeouts::default(),
        }
    }
}

impl RunConfig {
    /// Create a config for a hub pair with every other field at its default
    pub fn new(primary_context: impl Into<String>, secondary_context: impl Into<String>) -> Self {
        Self {
            primary_context: primary_context.into(),
            secondary_context: secondary_context.into(),
            ..Default::default()
        }
    }

    /// Set the activation method
    pub fn with_method(mut self, method: SwitchoverMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the old hub disposition
    pub fn with_old_hub_action(mut self, action: OldHubAction) -> Self {
        self.old_hub_action = action;
        self
    }

    /// Set the number of cycles
    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    /// Enable or disable dry-run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable stop-on-failure
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    /// Set the cooldown between cycles
    pub fn with_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    /// Set the output directory from a path or a string
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the state directory from a path or a string
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Set a deadline for the whole run
    pub fn with_run_timeout_seconds(mut self, seconds: Option<u64>) -> Self {
        self.run_timeout_seconds = seconds;
        self
    }

    /// Set the phase wait budgets
    pub fn with_timeouts(mut self, timeouts: WaitTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Pause between cycles
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Deadline for the whole run, if any
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.primary_context.trim().is_empty() {
            return Err(Error::configuration_for_field(
                "primary_context",
                "primary context must not be empty",
            ));
        }
        if self.secondary_context.trim().is_empty() {
            return Err(Error::configuration_for_field(
                "secondary_context",
                "secondary context must not be empty",
            ));
        }
        if self.primary_context == self.secondary_context {
            return Err(Error::configuration_for_field(
                "secondary_context",
                format!(
                    "primary and secondary contexts must differ (both are '{}')",
                    self.primary_context
                ),
            ));
        }
        if self.cycles == 0 {
            return Err(Error::configuration_for_field(
                "cycles",
                "cycles must be at least 1",
            ));
        }
        if self.run_timeout_seconds == Some(0) {
            return Err(Error::configuration_for_field(
                "run_timeout_seconds",
                "run timeout must be positive when set",
            ));
        }
        if self.timeouts.poll_interval_seconds == 0 {
            return Err(Error::configuration_for_field(
                "timeouts.poll_interval_seconds",
                "poll interval must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use switchover_common::ErrorKind;

    #[test]
    fn test_default_config_values() {
        let config = RunConfig::new("primary", "secondary");
        assert_eq!(config.method, SwitchoverMethod::Passive);
        assert_eq!(config.old_hub_action, OldHubAction::Secondary);
        assert_eq!(config.cycles, 5);
        assert!(!config.dry_run);
        assert!(!config.stop_on_failure);
        assert_eq!(config.cooldown_seconds, 30);
        assert_eq!(config.cooldown(), Duration::from_secs(30));
        assert!(config.run_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_override() {
        let config = RunConfig::new("hub1", "hub2")
            .with_method(SwitchoverMethod::Active)
            .with_old_hub_action(OldHubAction::Decommission)
            .with_cycles(10)
            .with_dry_run(true)
            .with_stop_on_failure(true)
            .with_cooldown_seconds(60);

        assert_eq!(config.method, SwitchoverMethod::Active);
        assert_eq!(config.old_hub_action, OldHubAction::Decommission);
        assert_eq!(config.cycles, 10);
        assert!(config.dry_run);
        assert!(config.stop_on_failure);
        assert_eq!(config.cooldown_seconds, 60);
    }

    #[test]
    fn test_path_fields_accept_strings_and_paths() {
        let from_str = RunConfig::new("a", "b")
            .with_output_dir("/tmp/out")
            .with_state_dir(".state");
        let from_path = RunConfig::new("a", "b")
            .with_output_dir(Path::new("/tmp/out"))
            .with_state_dir(PathBuf::from(".state"));

        assert_eq!(from_str.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(from_str, from_path);
    }

    #[test]
    fn test_validate_rejects_zero_cycles() {
        let err = RunConfig::new("a", "b").with_cycles(0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        match err {
            Error::Configuration { field, .. } => assert_eq!(field.as_deref(), Some("cycles")),
            _ => panic!("Expected Configuration variant"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_contexts() {
        assert!(RunConfig::new("", "b").validate().is_err());
        assert!(RunConfig::new("a", " ").validate().is_err());
        assert!(RunConfig::new("same", "same").validate().is_err());
        assert!(RunConfig::new("a", "b")
            .with_run_timeout_seconds(Some(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_method_and_action_parsing() {
        assert_eq!("active".parse::<SwitchoverMethod>().unwrap(), SwitchoverMethod::Active);
        assert_eq!("PASSIVE".parse::<SwitchoverMethod>().unwrap(), SwitchoverMethod::Passive);
        assert!("hot".parse::<SwitchoverMethod>().is_err());

        assert_eq!("none".parse::<OldHubAction>().unwrap(), OldHubAction::None);
        assert_eq!(
            "decommission".parse::<OldHubAction>().unwrap(),
            OldHubAction::Decommission
        );
        let err = "delete".parse::<OldHubAction>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_serde_uses_defaults_for_missing_fields() {
        let config: RunConfig = serde_json::from_str(
            r#"{"primary_context": "hub1", "secondary_context": "hub2", "method": "active"}"#,
        )
        .unwrap();
        assert_eq!(config.method, SwitchoverMethod::Active);
        assert_eq!(config.cycles, DEFAULT_CYCLES);
        assert_eq!(config.timeouts, WaitTimeouts::default());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["old_hub_action"], "secondary");
        assert_eq!(json["output_dir"], "./e2e-runs");
    }
}
