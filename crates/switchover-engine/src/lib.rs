//! Repeated ACM hub switchover
//!
//! Runs a configurable number of switchover cycles between two hubs,
//! swapping their roles each cycle, and reports per-phase timing.
//!
//! ## Architecture
//!
//! ```text
//! RunOrchestrator
//!   ├─ validates RunConfig, creates <output_dir>/<run_id>/{logs,states,metrics,manifests}
//!   └─ for cycle in 1..=cycles
//!        ├─ CycleDriver (parity-swapped contexts)
//!        │    ├─ ClientFactory -> ClusterClient x2
//!        │    └─ preflight -> primary_prep -> activation -> post_activation -> finalization
//!        ├─ states/cycle_NNN.json
//!        └─ cooldown (skipped after the last cycle)
//! ```
//!
//! Dry-run lives entirely in the cluster client: the driver and the
//! orchestrator follow the same control flow either way.

pub mod clients;
pub mod config;
pub mod cycle;
pub mod orchestrator;
pub mod phases;
pub mod preflight;
pub mod result;
pub mod state;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use clients::{ClientFactory, KubeClientFactory};
pub use config::{OldHubAction, RunConfig, SwitchoverMethod, WaitTimeouts};
pub use cycle::{contexts_for_cycle, CycleDriver, CycleRunner, CycleState};
pub use orchestrator::RunOrchestrator;
pub use phases::{Phase, PhaseContext, PhaseHandler};
pub use preflight::{PreflightValidator, ValidationCheckResult};
pub use result::{format_duration, CycleResult, PhaseResult, PhaseStats, RunResult};
pub use state::{StateManager, SwitchoverState};
pub use status::{RunState, RunStatus, StatusReporter};
