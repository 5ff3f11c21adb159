//! Task lifecycle: derive a task's state from the current monitor values.
//!
//! The state is never stored; it is recomputed from the latest monitor
//! snapshot every tick.
//!
//! | `ended` | `started` | `held` | State |
//! |---|---|---|---|
//! | true | – | – | `Succeeded` |
//! | false | true | true | `Running` |
//! | false | true | false | `Succeeded` |
//! | false | false | – | `Pending` |
//!
//! `Failed` is never derived here; the scheduler assigns it when an episode
//! aborts.

use motum_types::TaskState;
use serde::{Deserialize, Serialize};

/// Indices of a task's start, hold, and end monitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRefs {
    pub start: Vec<usize>,
    pub hold: Vec<usize>,
    pub end: Vec<usize>,
}

impl MonitorRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every referenced monitor index, in start/hold/end order.
    pub fn all(&self) -> impl Iterator<Item = usize> + '_ {
        self.start.iter().chain(&self.hold).chain(&self.end).copied()
    }
}

/// The flags a state was derived from, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub started: bool,
    pub held: bool,
    pub ended: bool,
}

impl TaskStatus {
    /// Whether the task's constraints belong in this tick's solver input.
    pub fn is_active(&self) -> bool {
        self.started && !self.ended
    }
}

/// Conjunction over `indices`; `empty` when there are none.
///
/// An index outside `values` reads as `false`.
fn all_true(indices: &[usize], values: &[bool], empty: bool) -> bool {
    if indices.is_empty() {
        return empty;
    }
    indices.iter().all(|&i| values.get(i).copied().unwrap_or(false))
}

pub fn task_status(refs: &MonitorRefs, values: &[bool]) -> TaskStatus {
    let started = all_true(&refs.start, values, true);
    let ended = all_true(&refs.end, values, false);
    let held = all_true(&refs.hold, values, false);
    let state = if ended {
        TaskState::Succeeded
    } else if started && held {
        TaskState::Running
    } else if started {
        TaskState::Succeeded
    } else {
        TaskState::Pending
    };
    TaskStatus {
        state,
        started,
        held,
        ended,
    }
}
