//! Phase, cycle and run results
//!
//! Results are created once and never mutated afterwards. Durations are
//! derived from the timestamps and included when a result is serialized, so
//! persisted files carry them without storing redundant state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::config::RunConfig;

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

/// Outcome of one phase execution
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseResult {
    /// Phase name (e.g., "activation")
    pub phase_name: String,
    /// Whether the phase completed its work
    pub success: bool,
    /// When the phase started
    pub start_time: DateTime<Utc>,
    /// When the phase ended, never before `start_time`
    pub end_time: DateTime<Utc>,
    /// Failure description
    pub error: Option<String>,
}

impl PhaseResult {
    /// Create a result; an `end_time` earlier than `start_time` is clamped to it.
    pub fn new(
        phase_name: impl Into<String>,
        success: bool,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            success,
            start_time,
            end_time: end_time.max(start_time),
            error,
        }
    }

    /// A successful phase
    pub fn succeeded(
        phase_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self::new(phase_name, true, start_time, end_time, None)
    }

    /// A failed phase
    pub fn failed(
        phase_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(phase_name, false, start_time, end_time, Some(error.into()))
    }

    /// Wall-clock duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }
}

impl Serialize for PhaseResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PhaseResult", 6)?;
        s.serialize_field("phase_name", &self.phase_name)?;
        s.serialize_field("success", &self.success)?;
        s.serialize_field("start_time", &self.start_time)?;
        s.serialize_field("end_time", &self.end_time)?;
        s.serialize_field("duration_seconds", &self.duration_seconds())?;
        s.serialize_field("error", &self.error)?;
        s.end()
    }
}

/// Outcome of one switchover cycle
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CycleResult {
    /// Unique cycle identifier
    pub cycle_id: String,
    /// 1-based cycle number
    pub cycle_num: u32,
    /// True iff all five phases ran and succeeded
    pub success: bool,
    /// When the cycle started
    pub start_time: DateTime<Utc>,
    /// When the cycle ended
    pub end_time: DateTime<Utc>,
    /// Hub acting as primary in this cycle
    pub primary_context: String,
    /// Hub acting as secondary in this cycle
    pub secondary_context: String,
    /// Results of the phases that ran, in order
    pub phase_results: Vec<PhaseResult>,
    /// Error of the phase that stopped the cycle
    pub error: Option<String>,
}

impl CycleResult {
    /// Wall-clock duration in seconds
    pub fn total_duration_seconds(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }

    /// The first failed phase, if any
    pub fn failed_phase(&self) -> Option<&PhaseResult> {
        self.phase_results.iter().find(|p| !p.success)
    }
}

impl Serialize for CycleResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CycleResult", 10)?;
        s.serialize_field("cycle_id", &self.cycle_id)?;
        s.serialize_field("cycle_num", &self.cycle_num)?;
        s.serialize_field("success", &self.success)?;
        s.serialize_field("start_time", &self.start_time)?;
        s.serialize_field("end_time", &self.end_time)?;
        s.serialize_field("total_duration_seconds", &self.total_duration_seconds())?;
        s.serialize_field("primary_context", &self.primary_context)?;
        s.serialize_field("secondary_context", &self.secondary_context)?;
        s.serialize_field("phase_results", &self.phase_results)?;
        s.serialize_field("error", &self.error)?;
        s.end()
    }
}

/// Aggregate timing of one phase across a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseStats {
    /// Number of executions
    pub count: u32,
    /// Number of successful executions
    pub successes: u32,
    /// Mean duration in seconds
    pub avg_seconds: f64,
    /// Shortest duration in seconds
    pub min_seconds: f64,
    /// Longest duration in seconds
    pub max_seconds: f64,
}

/// Outcome of a complete run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunResult {
    /// Run identifier, also the name of the run's output directory
    pub run_id: String,
    /// Configuration the run used
    pub config: RunConfig,
    /// Results of the cycles that ran, in order
    pub cycles: Vec<CycleResult>,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// When the run ended
    pub end_time: DateTime<Utc>,
    /// Number of successful cycles
    pub success_count: u32,
    /// Number of failed cycles
    pub failure_count: u32,
}

impl RunResult {
    /// Percentage of successful cycles, 0 when no cycle ran
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        100.0 * f64::from(self.success_count) / f64::from(total)
    }

    /// Wall-clock duration in seconds
    pub fn total_duration_seconds(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }

    /// Whether every cycle that ran succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failure_count == 0 && !self.cycles.is_empty()
    }

    /// Per-phase timing across all cycles, keyed by phase name
    pub fn phase_statistics(&self) -> BTreeMap<String, PhaseStats> {
        let mut durations: BTreeMap<String, (Vec<f64>, u32)> = BTreeMap::new();
        for phase in self.cycles.iter().flat_map(|c| &c.phase_results) {
            let entry = durations.entry(phase.phase_name.clone()).or_default();
            entry.0.push(phase.duration_seconds());
            if phase.success {
                entry.1 += 1;
            }
        }

        durations
            .into_iter()
            .map(|(name, (samples, successes))| {
                let count = samples.len() as u32;
                let sum: f64 = samples.iter().sum();
                let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
                let max = samples.iter().copied().fold(0.0, f64::max);
                let stats = PhaseStats {
                    count,
                    successes,
                    avg_seconds: sum / f64::from(count.max(1)),
                    min_seconds: if min.is_finite() { min } else { 0.0 },
                    max_seconds: max,
                };
                (name, stats)
            })
            .collect()
    }
}

impl Serialize for RunResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RunResult", 10)?;
        s.serialize_field("run_id", &self.run_id)?;
        s.serialize_field("config", &self.config)?;
        s.serialize_field("start_time", &self.start_time)?;
        s.serialize_field("end_time", &self.end_time)?;
        s.serialize_field("total_duration_seconds", &self.total_duration_seconds())?;
        s.serialize_field("success_count", &self.success_count)?;
        s.serialize_field("failure_count", &self.failure_count)?;
        s.serialize_field("success_rate", &self.success_rate())?;
        s.serialize_field("cycles", &self.cycles)?;
        s.serialize_field("phase_statistics", &self.phase_statistics())?;
        s.end()
    }
}

/// Format seconds as `"1h 2m 3s"`, `"2m 5s"` or `"42s"`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
