//! Cycle driver: one switchover attempt as an ordered state machine
//!
//! ```text
//! NotStarted -> Preflight -> PrimaryPrep -> Activation -> PostActivation -> Finalization -> Succeeded
//!                   \____________\______________\______________\_______________\---------> Failed
//! ```
//!
//! The first failed phase moves the cycle straight to `Failed`; later phases
//! are neither executed nor recorded. Roles alternate by cycle parity so a
//! multi-cycle run exercises failover in both directions.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::clients::ClientFactory;
use crate::config::RunConfig;
use crate::phases::{default_handlers, Phase, PhaseContext, PhaseHandler};
use crate::result::{CycleResult, PhaseResult};
use crate::state::StateManager;
use crate::status::StatusReporter;

/// Error text of a cycle stopped by cancellation or the run timeout
pub const CANCELLED_ERROR: &str = "run cancelled";

/// Position of a cycle in the phase state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// No phase has started
    NotStarted,
    /// A phase is executing
    Running(Phase),
    /// All five phases succeeded
    Succeeded,
    /// A phase failed or the run was cancelled
    Failed,
}

impl CycleState {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Succeeded | CycleState::Failed)
    }

    /// State after `phase` finished with `success`
    pub fn after(phase: Phase, success: bool) -> CycleState {
        match (success, phase.next()) {
            (false, _) => CycleState::Failed,
            (true, Some(next)) => CycleState::Running(next),
            (true, None) => CycleState::Succeeded,
        }
    }
}

/// `(primary, secondary)` for a cycle: odd cycles keep the configured roles,
/// even cycles swap them
pub fn contexts_for_cycle<'a>(cycle_num: u32, primary: &'a str, secondary: &'a str) -> (&'a str, &'a str) {
    if cycle_num % 2 == 1 {
        (primary, secondary)
    } else {
        (secondary, primary)
    }
}

/// Executes one switchover cycle
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CycleRunner: Send + Sync {
    /// Run cycle `cycle_num` with the given roles; never fails, failures are in the result
    async fn run_cycle(
        &self,
        cycle_num: u32,
        primary_context: &str,
        secondary_context: &str,
    ) -> CycleResult;
}

/// Production [`CycleRunner`] executing the phase handlers in order
pub struct CycleDriver {
    run_id: String,
    config: Arc<RunConfig>,
    clients: Arc<dyn ClientFactory>,
    handlers: Vec<Box<dyn PhaseHandler>>,
    status: StatusReporter,
    cancel: CancellationToken,
    manifests_dir: Option<PathBuf>,
}

impl CycleDriver {
    /// Create a driver using the default handlers
    pub fn new(
        run_id: impl Into<String>,
        config: Arc<RunConfig>,
        clients: Arc<dyn ClientFactory>,
        status: StatusReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            config,
            clients,
            handlers: default_handlers(),
            status,
            cancel,
            manifests_dir: None,
        }
    }

    /// Replace the phase handlers
    pub fn with_handlers(mut self, handlers: Vec<Box<dyn PhaseHandler>>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Record submitted manifests under `dir`
    pub fn with_manifests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifests_dir = Some(dir.into());
        self
    }

    fn save_state(result: switchover_common::Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist cycle state");
        }
    }

    async fn build_context(
        &self,
        cycle_num: u32,
        primary: &str,
        secondary: &str,
    ) -> Result<PhaseContext, String> {
        let dry_run = self.config.dry_run;
        let primary_client = self
            .clients
            .client_for(primary, dry_run)
            .await
            .map_err(|e| e.to_string())?;
        let secondary_client = self
            .clients
            .client_for(secondary, dry_run)
            .await
            .map_err(|e| e.to_string())?;
        Ok(PhaseContext {
            primary: primary_client,
            secondary: secondary_client,
            config: self.config.clone(),
            cycle_num,
            manifests_dir: self.manifests_dir.clone(),
        })
    }
}

#[async_trait]
impl CycleRunner for CycleDriver {
    async fn run_cycle(
        &self,
        cycle_num: u32,
        primary_context: &str,
        secondary_context: &str,
    ) -> CycleResult {
        let start_time = Utc::now();
        let cycle_id = format!("{}-cycle-{:03}", self.run_id, cycle_num);
        info!(
            cycle = cycle_num,
            primary = %primary_context,
            secondary = %secondary_context,
            dry_run = self.config.dry_run,
            "Starting switchover cycle"
        );

        let mut state = StateManager::new(
            &self.config.state_dir,
            primary_context,
            secondary_context,
            cycle_num,
        );
        let mut phase_results: Vec<PhaseResult> = Vec::new();
        let mut error: Option<String> = None;
        let mut current = CycleState::NotStarted;

        match self
            .build_context(cycle_num, primary_context, secondary_context)
            .await
        {
            // Unreachable hubs fail the cycle at preflight
            Err(e) => {
                let now = Utc::now();
                error!(cycle = cycle_num, error = %e, "Failed to create cluster clients");
                Self::save_state(state.record_error(Some(Phase::Preflight), &e));
                phase_results.push(PhaseResult::failed(
                    Phase::Preflight.as_str(),
                    start_time,
                    now,
                    e.clone(),
                ));
                error = Some(e);
                current = CycleState::Failed;
            }
            Ok(ctx) => {
                for handler in &self.handlers {
                    let phase = handler.phase();
                    if self.cancel.is_cancelled() {
                        warn!(cycle = cycle_num, phase = %phase, "Run cancelled, skipping remaining phases");
                        Self::save_state(state.record_error(Some(phase), CANCELLED_ERROR));
                        error = Some(CANCELLED_ERROR.to_string());
                        current = CycleState::Failed;
                        break;
                    }

                    current = CycleState::Running(phase);
                    self.status.phase_started(phase);
                    Self::save_state(state.start_phase(phase));

                    let result = handler.execute(&ctx).await;
                    let success = result.success;
                    let phase_error = result.error.clone();
                    phase_results.push(result);
                    current = CycleState::after(phase, success);

                    if success {
                        Self::save_state(state.complete_phase(phase));
                    } else {
                        let message = phase_error.unwrap_or_else(|| format!("{} failed", phase));
                        Self::save_state(state.record_error(Some(phase), &message));
                        error = Some(message);
                        break;
                    }
                }
            }
        }

        // A handler list shorter than the full phase order never reaches Succeeded
        let success = error.is_none() && current == CycleState::Succeeded;
        let end_time = Utc::now();
        let result = CycleResult {
            cycle_id,
            cycle_num,
            success,
            start_time,
            end_time,
            primary_context: primary_context.to_string(),
            secondary_context: secondary_context.to_string(),
            phase_results,
            error,
        };

        if result.success {
            info!(
                cycle = cycle_num,
                duration_secs = result.total_duration_seconds(),
                "Switchover cycle succeeded"
            );
        } else {
            error!(
                cycle = cycle_num,
                error = result.error.as_deref().unwrap_or("unknown"),
                "Switchover cycle failed"
            );
        }
        result
    }
}
