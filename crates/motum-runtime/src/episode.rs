//! [`EpisodeContext`] – everything one motion episode owns.
//!
//! The context is created when a motion request arrives and dropped when the
//! episode ends; nothing about an episode lives anywhere else.  Every leaf of
//! the control tree receives it by `&mut`.
//!
//! Within a tick the joint state is written only by the sync step; every
//! later step reads it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use motum_goals::{CollisionSynthesizer, CompiledGoal, GoalCompiler};
use motum_hal::{JointStateSlot, KinematicModel, ProximityService, RobotInterface, Solver};
use motum_kernel::{FeedWatchdog, MonitorSnapshot, TaskStatus};
use motum_types::{Constraint, ControllerConfig, JointState, MotionRequest, MotumError};
use uuid::Uuid;

use crate::convergence::ConvergenceWindow;

/// Name under which the joint-state feed is tracked by the watchdog.
pub const JOINT_STATE_FEED: &str = "joint_states";

/// Ticks the joint-state feed may skip before it is reported stale.
const FEED_ALLOWANCE_TICKS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Out-of-band request to abort an episode.  Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// The outside world as seen by one episode.
pub struct Collaborators {
    pub model: Arc<dyn KinematicModel>,
    pub proximity: Box<dyn ProximityService>,
    pub solver: Box<dyn Solver>,
    pub robot: Box<dyn RobotInterface>,
    pub feed: Arc<JointStateSlot>,
}

// ─────────────────────────────────────────────────────────────────────────────
// EpisodeContext
// ─────────────────────────────────────────────────────────────────────────────

pub struct EpisodeContext {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: ControllerConfig,
    pub request: MotionRequest,
    pub compiler: Arc<GoalCompiler>,

    pub model: Arc<dyn KinematicModel>,
    pub proximity: Box<dyn ProximityService>,
    pub solver: Box<dyn Solver>,
    pub robot: Box<dyn RobotInterface>,
    pub feed: Arc<JointStateSlot>,
    pub cancel: CancelToken,

    // ── World ────────────────────────────────────────────────────────────────
    pub state: JointState,
    /// At least one sample has arrived.
    pub has_sample: bool,
    pub watchdog: FeedWatchdog,
    pub sensor_timeouts: u64,
    pub consecutive_timeouts: u32,

    // ── Compiled goal ────────────────────────────────────────────────────────
    pub goal: Option<CompiledGoal>,
    pub collisions: Option<CollisionSynthesizer>,

    // ── Per tick ─────────────────────────────────────────────────────────────
    /// Index of the tick in progress; equals the number of recorded ticks.
    pub tick: u64,
    pub time: f64,
    /// Monitor values evaluated this tick, waiting for their task states.
    pub monitor_snapshot: Option<MonitorSnapshot>,
    pub task_status: Vec<TaskStatus>,
    /// Constraints handed to the solver this tick.
    pub solver_constraints: BTreeMap<String, Constraint>,
    pub command: BTreeMap<String, f64>,
    pub convergence: ConvergenceWindow,

    /// First failure of the episode; once set every tick short-circuits.
    pub fault: Option<MotumError>,
}

impl EpisodeContext {
    pub fn new(
        collaborators: Collaborators,
        compiler: Arc<GoalCompiler>,
        request: MotionRequest,
        config: ControllerConfig,
    ) -> Self {
        let mut watchdog = FeedWatchdog::new();
        watchdog.register(JOINT_STATE_FEED, FEED_ALLOWANCE_TICKS);
        let convergence = ConvergenceWindow::new(config.convergence_window, config.convergence_velocity);
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            request,
            compiler,
            model: collaborators.model,
            proximity: collaborators.proximity,
            solver: collaborators.solver,
            robot: collaborators.robot,
            feed: collaborators.feed,
            cancel: CancelToken::new(),
            state: JointState::default(),
            has_sample: false,
            watchdog,
            sensor_timeouts: 0,
            consecutive_timeouts: 0,
            goal: None,
            collisions: None,
            tick: 0,
            time: 0.0,
            monitor_snapshot: None,
            task_status: Vec::new(),
            solver_constraints: BTreeMap::new(),
            command: BTreeMap::new(),
            convergence,
            fault: None,
        }
    }

    /// Replace the cancellation flag with one shared with the caller.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Record `error` in the fault slot unless an earlier one is there.
    pub fn raise(&mut self, error: MotumError) -> MotumError {
        self.fault.get_or_insert(error).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
