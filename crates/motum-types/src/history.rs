//! Per-tick history and the episode report built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MotumError;

/// Externally visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    /// Only set when the episode is aborted.
    Failed,
}

/// Where a monitor stands on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    /// Gated out by its start monitors; its value was carried over.
    Inactive,
    /// Evaluated and false.
    Running,
    /// Evaluated (or latched) true.
    Satisfied,
}

/// One row of the append-only tick history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickHistoryEntry {
    pub tick: u64,
    /// Control time in seconds (`tick * sample_period`).
    pub time: f64,
    /// Indexed like [`EpisodeReport::monitors`].
    pub monitors: Vec<bool>,
    pub monitor_phases: Vec<MonitorPhase>,
    /// Indexed like [`EpisodeReport::tasks`].
    pub tasks: Vec<TaskState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub name: String,
    pub kind: String,
    pub start_monitors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// `{goal}/{task}`.
    pub name: String,
    pub constraints: Vec<String>,
    pub start_monitors: Vec<String>,
    pub hold_monitors: Vec<String>,
    pub end_monitors: Vec<String>,
    pub final_state: TaskState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "error", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EpisodeOutcome {
    Success,
    Failure(MotumError),
}

impl EpisodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EpisodeOutcome::Success)
    }
}

/// Streamed while an episode runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Running { tick: u64, time: f64 },
    Finished(EpisodeOutcome),
}

/// Everything an external reporter needs about one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: EpisodeOutcome,
    pub ticks_executed: u64,
    pub sensor_timeouts: u64,
    pub monitors: Vec<MonitorSummary>,
    pub tasks: Vec<TaskSummary>,
    pub history: Vec<TickHistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serialises_with_result_tag() {
        let json = serde_json::to_value(EpisodeOutcome::Success).unwrap();
        assert_eq!(json["result"], "SUCCESS");
        let failed = EpisodeOutcome::Failure(MotumError::Cancelled("ctrl-c".into()));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["result"], "FAILURE");
        assert!(!failed.is_success());
    }

    #[test]
    fn task_state_uses_upper_case_labels() {
        assert_eq!(serde_json::to_string(&TaskState::Succeeded).unwrap(), "\"SUCCEEDED\"");
    }
}
