//! The five ordered units of work in a switchover cycle
//!
//! Every handler implements [`PhaseHandler::run`] and gets
//! [`PhaseHandler::execute`] for free: it timestamps the work and converts
//! any error into a failed [`PhaseResult`], so no error ever crosses a phase
//! boundary.
//!
//! # Order
//!
//! ```text
//! preflight -> primary_prep -> activation -> post_activation -> finalization
//! ```

mod activation;
mod finalization;
mod post_activation;
mod preflight;
mod primary_prep;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use switchover_common::acm::OBSERVABILITY_NAMESPACE;
use switchover_common::{ClusterClient, Result};

use crate::config::RunConfig;
use crate::result::PhaseResult;

pub use activation::ActivationPhase;
pub use finalization::FinalizationPhase;
pub use post_activation::PostActivationPhase;
pub use preflight::PreflightPhase;
pub use primary_prep::PrimaryPrepPhase;

/// A named phase of a switchover cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Validate both hubs
    Preflight,
    /// Prepare the outgoing primary
    PrimaryPrep,
    /// Promote the secondary
    Activation,
    /// Verify the new primary
    PostActivation,
    /// Apply the old hub disposition
    Finalization,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 5] = [
        Phase::Preflight,
        Phase::PrimaryPrep,
        Phase::Activation,
        Phase::PostActivation,
        Phase::Finalization,
    ];

    /// Snake-case phase name
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Preflight => "preflight",
            Phase::PrimaryPrep => "primary_prep",
            Phase::Activation => "activation",
            Phase::PostActivation => "post_activation",
            Phase::Finalization => "finalization",
        }
    }

    /// The phase that follows this one, `None` after finalization
    pub fn next(self) -> Option<Phase> {
        let idx = Phase::ALL.iter().position(|p| *p == self)?;
        Phase::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a phase needs: both hubs, the run configuration and where to
/// record applied manifests
#[derive(Debug, Clone)]
pub struct PhaseContext {
    /// Hub giving up the active role in this cycle
    pub primary: ClusterClient,
    /// Hub taking over the active role in this cycle
    pub secondary: ClusterClient,
    /// Run configuration
    pub config: Arc<RunConfig>,
    /// 1-based cycle number
    pub cycle_num: u32,
    /// Directory receiving submitted manifests, if any
    pub manifests_dir: Option<PathBuf>,
}

impl PhaseContext {
    /// Whether mutations are suppressed
    pub fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Write a submitted manifest to `manifests/cycle_NNN_<name>.json`.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn record_manifest(&self, name: &str, body: &Value) {
        let Some(dir) = &self.manifests_dir else {
            return;
        };
        let path = dir.join(format!("cycle_{:03}_{}.json", self.cycle_num, name));
        let written = serde_json::to_string_pretty(body)
            .map_err(|e| e.to_string())
            .and_then(|s| std::fs::write(&path, s).map_err(|e| e.to_string()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Failed to record manifest");
        }
    }
}

/// Whether multicluster observability is installed on a hub
pub(crate) async fn observability_present(client: &ClusterClient) -> Result<bool> {
    client.namespace_exists(OBSERVABILITY_NAMESPACE).await
}

/// A unit of work in a switchover cycle
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Which phase this handler implements
    fn phase(&self) -> Phase;

    /// Do the work, reporting any failure as an error
    async fn run(&self, ctx: &PhaseContext) -> Result<()>;

    /// Run the phase and convert the outcome into a [`PhaseResult`]
    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult {
        let phase = self.phase();
        info!(cycle = ctx.cycle_num, phase = %phase, dry_run = ctx.dry_run(), "Starting phase");

        let start = Utc::now();
        let outcome = self.run(ctx).await;
        let end = Utc::now();

        match outcome {
            Ok(()) => {
                let result = PhaseResult::succeeded(phase.as_str(), start, end);
                info!(
                    cycle = ctx.cycle_num,
                    phase = %phase,
                    duration_secs = result.duration_seconds(),
                    "Phase complete"
                );
                result
            }
            Err(e) => {
                error!(cycle = ctx.cycle_num, phase = %phase, error = %e, "Phase failed");
                PhaseResult::failed(phase.as_str(), start, end, e.to_string())
            }
        }
    }
}

/// The production handlers in execution order
pub fn default_handlers() -> Vec<Box<dyn PhaseHandler>> {
    vec![
        Box::new(PreflightPhase),
        Box::new(PrimaryPrepPhase),
        Box::new(ActivationPhase),
        Box::new(PostActivationPhase),
        Box::new(FinalizationPhase),
    ]
}
