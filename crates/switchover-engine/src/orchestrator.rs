//! Run orchestrator
//!
//! Drives the configured number of cycles one after another, alternating
//! hub roles, applying the stop-on-failure policy and the cooldown between
//! cycles. Owns the run's output tree:
//!
//! ```text
//! <output_dir>/<run_id>/
//!   logs/        run.log
//!   states/      cycle_NNN.json, written before the next cycle starts
//!   metrics/     run_summary.json, phase_durations.json
//!   manifests/   cycle_NNN_<name>.json, bodies submitted by phases
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use switchover_common::{Error, Result};

use crate::clients::ClientFactory;
use crate::config::RunConfig;
use crate::cycle::{contexts_for_cycle, CycleDriver, CycleRunner};
use crate::result::{CycleResult, RunResult};
use crate::status::{RunStatus, StatusReporter};

fn new_run_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("run_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), suffix)
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    let written = serde_json::to_string_pretty(value)
        .map_err(|e| e.to_string())
        .and_then(|s| std::fs::write(path, s).map_err(|e| e.to_string()));
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to write run output");
    }
}

/// Runs repeated switchover cycles and aggregates their results
pub struct RunOrchestrator {
    config: Arc<RunConfig>,
    run_id: String,
    run_dir: PathBuf,
    status: StatusReporter,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    /// Validate `config`, allocate a run id and create the output tree.
    ///
    /// Fails with a configuration error when the config is invalid or the
    /// output directories cannot be created.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;

        let run_id = new_run_id();
        let run_dir = config.output_dir.join(&run_id);
        for sub in ["logs", "states", "metrics", "manifests"] {
            let dir = run_dir.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::configuration_for_field(
                    "output_dir",
                    format!("cannot create {}: {}", dir.display(), e),
                )
            })?;
        }

        let status = StatusReporter::new(&run_id, config.cycles);
        Ok(Self {
            config: Arc::new(config),
            run_id,
            run_dir,
            status,
            cancel: CancellationToken::new(),
        })
    }

    /// Run identifier
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Root of this run's output tree
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Directory for log files
    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir.join("logs")
    }

    /// Directory for per-cycle results
    pub fn states_dir(&self) -> PathBuf {
        self.run_dir.join("states")
    }

    /// Directory for run summaries
    pub fn metrics_dir(&self) -> PathBuf {
        self.run_dir.join("metrics")
    }

    /// Directory for submitted manifests
    pub fn manifests_dir(&self) -> PathBuf {
        self.run_dir.join("manifests")
    }

    /// Subscribe to run progress
    pub fn status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Token that stops the run at the next phase boundary when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A cycle driver wired to this run's config, status and output tree
    pub fn cycle_driver(&self, clients: Arc<dyn ClientFactory>) -> CycleDriver {
        CycleDriver::new(
            self.run_id.clone(),
            self.config.clone(),
            clients,
            self.status.clone(),
            self.cancel.clone(),
        )
        .with_manifests_dir(self.manifests_dir())
    }

    fn persist_cycle(&self, result: &CycleResult) {
        let path = self
            .states_dir()
            .join(format!("cycle_{:03}.json", result.cycle_num));
        write_json(&path, result);
    }

    fn persist_summary(&self, result: &RunResult) {
        let metrics = self.metrics_dir();
        write_json(&metrics.join("run_summary.json"), result);
        write_json(&metrics.join("phase_durations.json"), &result.phase_statistics());
    }

    /// Sleep for the cooldown; returns `false` when cancelled first
    async fn cooldown(&self) -> bool {
        let cooldown = self.config.cooldown();
        info!(seconds = cooldown.as_secs(), "Cooling down before next cycle");
        self.status.cooling_down();
        tokio::select! {
            _ = tokio::time::sleep(cooldown) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Run every configured cycle through `runner` and aggregate the results
    pub async fn run_all_cycles(&self, runner: &dyn CycleRunner) -> RunResult {
        let start_time = Utc::now();
        let config = &self.config;

        let deadline = config.run_timeout().map(|timeout| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(seconds = timeout.as_secs(), "Run timeout reached, cancelling");
                cancel.cancel();
            })
        });

        info!(
            run_id = %self.run_id,
            run_dir = %self.run_dir.display(),
            cycles = config.cycles,
            primary = %config.primary_context,
            secondary = %config.secondary_context,
            method = %config.method,
            dry_run = config.dry_run,
            "Starting switchover run"
        );

        let mut cycles = Vec::new();
        let mut success_count = 0u32;
        let mut failure_count = 0u32;

        for cycle_num in 1..=config.cycles {
            if self.cancel.is_cancelled() {
                warn!(cycle = cycle_num, "Run cancelled, not starting further cycles");
                break;
            }

            let (primary, secondary) =
                contexts_for_cycle(cycle_num, &config.primary_context, &config.secondary_context);
            self.status.cycle_started(cycle_num);
            let result = runner.run_cycle(cycle_num, primary, secondary).await;

            if result.success {
                success_count += 1;
            } else {
                failure_count += 1;
            }
            self.status.cycle_finished(result.success);
            self.persist_cycle(&result);
            let failed = !result.success;
            cycles.push(result);

            if failed && config.stop_on_failure {
                warn!(cycle = cycle_num, "Cycle failed, stopping run");
                break;
            }

            let last = cycle_num == config.cycles;
            if !last && !config.cooldown().is_zero() && !self.cooldown().await {
                warn!(cycle = cycle_num, "Run cancelled during cooldown");
                break;
            }
        }

        if let Some(handle) = deadline {
            handle.abort();
        }

        let result = RunResult {
            run_id: self.run_id.clone(),
            config: (**config).clone(),
            cycles,
            start_time,
            end_time: Utc::now(),
            success_count,
            failure_count,
        };
        self.persist_summary(&result);
        self.status.finished(self.cancel.is_cancelled());

        info!(
            run_id = %self.run_id,
            successes = result.success_count,
            failures = result.failure_count,
            success_rate = result.success_rate(),
            duration_secs = result.total_duration_seconds(),
            "Switchover run finished"
        );
        result
    }
}
