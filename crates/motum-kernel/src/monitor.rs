//! [`Monitor`] – a named boolean predicate evaluated once per tick.
//!
//! Two families exist:
//!
//! - **Condition monitors** ([`ConditionMonitor`]) are pure functions of the
//!   world state.  They may latch: with `stay_true` set, a monitor that was
//!   true on the previous tick stays true without being re-evaluated.
//! - **Payload monitors** ([`PayloadMonitor`]) carry internal state (timers,
//!   one-shot side effects) and may raise an error that ends the episode.
//!   They never latch.
//!
//! A monitor's *start monitors* gate it: it is only evaluated on ticks where
//! all of them were true on the previous tick.

use motum_hal::KinematicModel;
use motum_types::{JointState, MotumError};

/// Read-only view of the world handed to every monitor.
#[derive(Clone, Copy)]
pub struct MonitorContext<'a> {
    pub model: &'a dyn KinematicModel,
    pub state: &'a JointState,
    /// Control time in seconds.
    pub time: f64,
}

/// A stateless predicate over the world.
pub trait ConditionMonitor: Send + Sync {
    /// Registered kind name, used in reports.
    fn kind(&self) -> &'static str;

    fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError>;
}

/// A stateful monitor run on every tick it is active.
///
/// Running twice with the same context must produce the same result.
pub trait PayloadMonitor: Send {
    fn kind(&self) -> &'static str;

    fn run(&mut self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError>;

    /// `true` for monitors whose truth ends the episode successfully.
    fn ends_motion(&self) -> bool {
        false
    }
}

pub enum MonitorBody {
    Condition {
        predicate: Box<dyn ConditionMonitor>,
        stay_true: bool,
    },
    Payload(Box<dyn PayloadMonitor>),
}

/// A compiled monitor with its start monitors resolved to indices.
pub struct Monitor {
    name: String,
    start_monitors: Vec<usize>,
    body: MonitorBody,
}

impl Monitor {
    pub fn condition(name: impl Into<String>, predicate: Box<dyn ConditionMonitor>, stay_true: bool) -> Self {
        Self {
            name: name.into(),
            start_monitors: Vec::new(),
            body: MonitorBody::Condition { predicate, stay_true },
        }
    }

    pub fn payload(name: impl Into<String>, payload: Box<dyn PayloadMonitor>) -> Self {
        Self {
            name: name.into(),
            start_monitors: Vec::new(),
            body: MonitorBody::Payload(payload),
        }
    }

    pub fn with_start_monitors(mut self, start_monitors: Vec<usize>) -> Self {
        self.start_monitors = start_monitors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        match &self.body {
            MonitorBody::Condition { predicate, .. } => predicate.kind(),
            MonitorBody::Payload(payload) => payload.kind(),
        }
    }

    pub fn start_monitors(&self) -> &[usize] {
        &self.start_monitors
    }

    pub fn is_payload(&self) -> bool {
        matches!(self.body, MonitorBody::Payload(_))
    }

    pub fn ends_motion(&self) -> bool {
        match &self.body {
            MonitorBody::Payload(payload) => payload.ends_motion(),
            MonitorBody::Condition { .. } => false,
        }
    }

    /// Compute this tick's value for an active monitor.
    pub(crate) fn evaluate(&mut self, previous: bool, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        match &mut self.body {
            MonitorBody::Condition { stay_true: true, .. } if previous => Ok(true),
            MonitorBody::Condition { predicate, .. } => predicate.evaluate(ctx),
            MonitorBody::Payload(payload) => payload.run(ctx),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("start_monitors", &self.start_monitors)
            .finish()
    }
}
