//! Live run status for health and progress consumers
//!
//! The orchestrator and cycle driver publish a [`RunStatus`] snapshot on a
//! `tokio::sync::watch` channel. Consumers subscribe and read the latest
//! value; nothing in the engine ever waits on them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::phases::Phase;

/// Coarse state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, no cycle started yet
    Pending,
    /// A cycle is executing
    Running,
    /// Sleeping between cycles
    Cooldown,
    /// All requested cycles ran (or stop-on-failure ended the run)
    Completed,
    /// The run was cancelled or timed out
    Cancelled,
}

/// Snapshot of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    /// Run identifier
    pub run_id: String,
    /// Coarse state
    pub state: RunState,
    /// Cycle currently (or last) executing, 0 before the first cycle
    pub current_cycle: u32,
    /// Number of requested cycles
    pub total_cycles: u32,
    /// Phase currently executing
    pub current_phase: Option<Phase>,
    /// Successful cycles so far
    pub success_count: u32,
    /// Failed cycles so far
    pub failure_count: u32,
    /// When the snapshot was last changed
    pub updated_at: DateTime<Utc>,
}

impl RunStatus {
    fn new(run_id: &str, total_cycles: u32) -> Self {
        Self {
            run_id: run_id.to_string(),
            state: RunState::Pending,
            current_cycle: 0,
            total_cycles,
            current_phase: None,
            success_count: 0,
            failure_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether the run is still making progress
    pub fn is_active(&self) -> bool {
        matches!(self.state, RunState::Pending | RunState::Running | RunState::Cooldown)
    }
}

/// Publisher side of the status channel
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<RunStatus>>,
}

impl StatusReporter {
    /// Create a reporter in the `Pending` state
    pub fn new(run_id: &str, total_cycles: u32) -> Self {
        let (tx, _rx) = watch::channel(RunStatus::new(run_id, total_cycles));
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.tx.subscribe()
    }

    /// Latest snapshot
    pub fn current(&self) -> RunStatus {
        self.tx.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut RunStatus)) {
        self.tx.send_modify(|status| {
            f(status);
            status.updated_at = Utc::now();
        });
    }

    /// Mark a cycle as started
    pub fn cycle_started(&self, cycle_num: u32) {
        self.update(|s| {
            s.state = RunState::Running;
            s.current_cycle = cycle_num;
            s.current_phase = None;
        });
    }

    /// Mark a phase as started
    pub fn phase_started(&self, phase: Phase) {
        self.update(|s| s.current_phase = Some(phase));
    }

    /// Record a finished cycle
    pub fn cycle_finished(&self, success: bool) {
        self.update(|s| {
            s.current_phase = None;
            if success {
                s.success_count += 1;
            } else {
                s.failure_count += 1;
            }
        });
    }

    /// Enter the cooldown between cycles
    pub fn cooling_down(&self) {
        self.update(|s| s.state = RunState::Cooldown);
    }

    /// Mark the run as finished
    pub fn finished(&self, cancelled: bool) {
        self.update(|s| {
            s.current_phase = None;
            s.state = if cancelled {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
        });
    }
}
