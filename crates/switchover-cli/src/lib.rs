//! ACM switchover CLI library

pub mod error;
pub mod summary;

pub use error::{Error, Result};

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use switchover_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use switchover_engine::config::{DEFAULT_COOLDOWN_SECONDS, DEFAULT_CYCLES};
use switchover_engine::{
    KubeClientFactory, OldHubAction, RunConfig, RunOrchestrator, RunResult, SwitchoverMethod,
    WaitTimeouts,
};

/// Exit code when at least one cycle failed
pub const EXIT_CYCLE_FAILED: u8 = 1;

/// Exit code when the run could not start
pub const EXIT_SETUP_FAILED: u8 = 2;

/// Repeated ACM hub switchover between two kube contexts
#[derive(Parser, Debug)]
#[command(name = "acm-switchover")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Context of the hub that is active before the first cycle
    #[arg(long, env = "SWITCHOVER_PRIMARY_CONTEXT")]
    pub primary_context: String,

    /// Context of the hub that takes over in the first cycle
    #[arg(long, env = "SWITCHOVER_SECONDARY_CONTEXT")]
    pub secondary_context: String,

    /// Switchover method: active or passive
    #[arg(long, env = "SWITCHOVER_METHOD", default_value = "passive")]
    pub method: SwitchoverMethod,

    /// What happens to the old hub: secondary, decommission or none
    #[arg(long, env = "SWITCHOVER_OLD_HUB_ACTION", default_value = "secondary")]
    pub old_hub_action: OldHubAction,

    /// Number of cycles to run
    #[arg(long, env = "SWITCHOVER_CYCLES", default_value_t = DEFAULT_CYCLES)]
    pub cycles: u32,

    /// Log mutations instead of applying them
    #[arg(long, env = "SWITCHOVER_DRY_RUN")]
    pub dry_run: bool,

    /// Stop after the first failed cycle
    #[arg(long, env = "SWITCHOVER_STOP_ON_FAILURE")]
    pub stop_on_failure: bool,

    /// Seconds to wait between cycles
    #[arg(long, env = "SWITCHOVER_COOLDOWN_SECONDS", default_value_t = DEFAULT_COOLDOWN_SECONDS)]
    pub cooldown_seconds: u64,

    /// Directory receiving one subdirectory per run
    #[arg(long, env = "SWITCHOVER_OUTPUT_DIR", default_value = "./e2e-runs")]
    pub output_dir: PathBuf,

    /// Directory for per-cycle state files
    #[arg(long, env = "SWITCHOVER_STATE_DIR", default_value = ".state")]
    pub state_dir: PathBuf,

    /// Abort the run at the next phase boundary after this many seconds
    #[arg(long, env = "SWITCHOVER_RUN_TIMEOUT_SECONDS")]
    pub run_timeout_seconds: Option<u64>,

    /// Seconds to wait for a restore to finish
    #[arg(long, env = "SWITCHOVER_RESTORE_TIMEOUT_SECONDS")]
    pub restore_timeout_seconds: Option<u64>,

    /// Seconds to wait for managed clusters to become available
    #[arg(long, env = "SWITCHOVER_CLUSTERS_TIMEOUT_SECONDS")]
    pub clusters_timeout_seconds: Option<u64>,

    /// Seconds to wait for pods to become ready
    #[arg(long, env = "SWITCHOVER_PODS_TIMEOUT_SECONDS")]
    pub pods_timeout_seconds: Option<u64>,

    /// Seconds between condition polls
    #[arg(long, env = "SWITCHOVER_POLL_INTERVAL_SECONDS")]
    pub poll_interval_seconds: Option<u64>,

    /// Console log format: text or json
    #[arg(long, env = "SWITCHOVER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Kubeconfig file (defaults to the standard lookup)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

impl Cli {
    /// Resolve flags into a run configuration
    pub fn run_config(&self) -> RunConfig {
        let defaults = WaitTimeouts::default();
        let timeouts = WaitTimeouts {
            restore_seconds: self.restore_timeout_seconds.unwrap_or(defaults.restore_seconds),
            clusters_available_seconds: self
                .clusters_timeout_seconds
                .unwrap_or(defaults.clusters_available_seconds),
            pods_ready_seconds: self.pods_timeout_seconds.unwrap_or(defaults.pods_ready_seconds),
            poll_interval_seconds: self
                .poll_interval_seconds
                .unwrap_or(defaults.poll_interval_seconds),
        };

        RunConfig::new(&self.primary_context, &self.secondary_context)
            .with_method(self.method)
            .with_old_hub_action(self.old_hub_action)
            .with_cycles(self.cycles)
            .with_dry_run(self.dry_run)
            .with_stop_on_failure(self.stop_on_failure)
            .with_cooldown_seconds(self.cooldown_seconds)
            .with_output_dir(&self.output_dir)
            .with_state_dir(&self.state_dir)
            .with_run_timeout_seconds(self.run_timeout_seconds)
            .with_timeouts(timeouts)
    }

    /// Run every cycle and print the summary
    pub async fn run(self) -> Result<RunResult> {
        let orchestrator = RunOrchestrator::new(self.run_config())?;

        init_telemetry(
            TelemetryConfig {
                format: self.log_format,
                ..Default::default()
            }
            .with_log_file(orchestrator.logs_dir().join("run.log")),
        )?;

        let cancel = orchestrator.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping at the next phase boundary");
                cancel.cancel();
            }
        });

        let clients = Arc::new(KubeClientFactory::new(self.kubeconfig));
        let driver = orchestrator.cycle_driver(clients);
        let result = orchestrator.run_all_cycles(&driver).await;

        println!("{}", summary::render_summary(&result));
        println!("\nOutput: {}", orchestrator.run_dir().display());
        Ok(result)
    }
}

/// Process exit code for a finished run
pub fn exit_code(result: &RunResult) -> ExitCode {
    if result.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_CYCLE_FAILED)
    }
}
