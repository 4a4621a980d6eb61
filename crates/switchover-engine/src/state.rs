//! Per-cycle switchover state files
//!
//! Each cycle writes `<state_dir>/switchover-<primary>__<secondary>.json`
//! at every phase transition so an operator can see where a cycle stopped.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchover_common::{Error, Result};

use crate::phases::Phase;

/// Persisted state of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchoverState {
    /// Hub acting as primary
    pub primary_context: String,
    /// Hub acting as secondary
    pub secondary_context: String,
    /// Cycle number
    pub cycle_num: u32,
    /// Phase currently executing
    pub current_phase: Option<Phase>,
    /// Phases that finished successfully, in order
    pub completed_phases: Vec<Phase>,
    /// Errors recorded so far, prefixed with their phase
    pub errors: Vec<String>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Keep context names usable as file name components
fn sanitize(context: &str) -> String {
    context
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Path of the state file for a hub pair
pub fn state_file_path(state_dir: &Path, primary: &str, secondary: &str) -> PathBuf {
    state_dir.join(format!(
        "switchover-{}__{}.json",
        sanitize(primary),
        sanitize(secondary)
    ))
}

/// Owner of one cycle's state file
#[derive(Debug)]
pub struct StateManager {
    path: PathBuf,
    state: SwitchoverState,
}

impl StateManager {
    /// Start fresh state for a cycle (nothing is written until [`StateManager::save`])
    pub fn new(state_dir: &Path, primary: &str, secondary: &str, cycle_num: u32) -> Self {
        Self {
            path: state_file_path(state_dir, primary, secondary),
            state: SwitchoverState {
                primary_context: primary.to_string(),
                secondary_context: secondary.to_string(),
                cycle_num,
                current_phase: None,
                completed_phases: Vec::new(),
                errors: Vec::new(),
                updated_at: Utc::now(),
            },
        }
    }

    /// Read a state file
    pub fn load(path: &Path) -> Result<SwitchoverState> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::fatal_for("state", format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::fatal_for("state", format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory state
    pub fn state(&self) -> &SwitchoverState {
        &self.state
    }

    /// Record that `phase` started and persist
    pub fn start_phase(&mut self, phase: Phase) -> Result<()> {
        self.state.current_phase = Some(phase);
        self.save()
    }

    /// Record that `phase` succeeded and persist
    pub fn complete_phase(&mut self, phase: Phase) -> Result<()> {
        self.state.current_phase = None;
        if !self.state.completed_phases.contains(&phase) {
            self.state.completed_phases.push(phase);
        }
        self.save()
    }

    /// Record a failure and persist
    pub fn record_error(&mut self, phase: Option<Phase>, message: &str) -> Result<()> {
        let entry = match phase {
            Some(p) => format!("{}: {}", p, message),
            None => message.to_string(),
        };
        self.state.errors.push(entry);
        self.save()
    }

    /// Write the state file atomically (temp file + rename)
    pub fn save(&mut self) -> Result<()> {
        self.state.updated_at = Utc::now();

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                Error::fatal_for("state", format!("failed to create {}: {}", dir.display(), e))
            })?;
        }

        let body = serde_json::to_string_pretty(&self.state)
            .map_err(|e| Error::fatal_for("state", format!("failed to encode state: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| {
            Error::fatal_for("state", format!("failed to write {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            Error::fatal_for(
                "state",
                format!("failed to move {} into place: {}", tmp.display(), e),
            )
        })?;

        debug!(path = %self.path.display(), "Saved switchover state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_name() {
        let path = state_file_path(Path::new("/tmp/state"), "hub1", "hub2");
        assert_eq!(path, PathBuf::from("/tmp/state/switchover-hub1__hub2.json"));

        let path = state_file_path(Path::new("s"), "default/api-hub:6443/admin", "hub2");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("switchover-default_api-hub_6443_admin__hub2.json")
        );
    }

    #[test]
    fn test_phase_transitions_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("nested").join("state");
        let mut mgr = StateManager::new(&state_dir, "hub1", "hub2", 2);

        mgr.start_phase(Phase::Preflight).unwrap();
        let saved = StateManager::load(mgr.path()).unwrap();
        assert_eq!(saved.current_phase, Some(Phase::Preflight));
        assert_eq!(saved.cycle_num, 2);

        mgr.complete_phase(Phase::Preflight).unwrap();
        mgr.start_phase(Phase::PrimaryPrep).unwrap();
        mgr.record_error(Some(Phase::PrimaryPrep), "forbidden").unwrap();

        let saved = StateManager::load(mgr.path()).unwrap();
        assert_eq!(saved.completed_phases, vec![Phase::Preflight]);
        assert_eq!(saved.current_phase, Some(Phase::PrimaryPrep));
        assert_eq!(saved.errors, vec!["primary_prep: forbidden".to_string()]);
        assert_eq!(&saved, mgr.state());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StateManager::load(&dir.path().join("missing.json")).is_err());
    }
}
