//! The single error taxonomy shared by compiler, scheduler, and backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to tell the user after an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KindHint {
    /// Registered names similar to the requested one.
    Suggestions(Vec<String>),
    /// No close match: the full registry listing.
    Available(Vec<String>),
}

impl std::fmt::Display for KindHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KindHint::Suggestions(names) => write!(f, "did you mean one of: {}?", names.join(", ")),
            KindHint::Available(names) => write!(f, "available kinds: {}", names.join(", ")),
        }
    }
}

/// Global error type spanning goal compilation, solving, and the robot link.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotumError {
    #[error("Unknown constraint kind \"{kind}\"; {hint}")]
    UnknownConstraintKind { kind: String, hint: KindHint },

    #[error("Unknown monitor kind \"{kind}\"; {hint}")]
    UnknownMonitorKind { kind: String, hint: KindHint },

    #[error("Initialization of \"{kind}\" constraint failed: {cause}")]
    ConstraintInitializationFailed {
        kind: String,
        cause: String,
        usage: Option<String>,
    },

    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Infeasible solve: {0}")]
    InfeasibleSolve(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout: no joint state within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("Aborted by monitor \"{monitor}\": {message}")]
    Aborted { monitor: String, message: String },

    #[error("Trajectory longer than {limit_s} s")]
    TrajectoryTooLong { limit_s: f64 },

    #[error("Self collision between {link_a} and {link_b} (distance {distance})")]
    SelfCollisionViolated {
        link_a: String,
        link_b: String,
        distance: f64,
    },

    #[error("Hardware Fault on {component}: {details}")]
    Hardware { component: String, details: String },
}

impl MotumError {
    /// Stable numeric code for transport-level reporting.
    pub fn code(&self) -> u32 {
        match self {
            MotumError::UnknownConstraintKind { .. } => 100,
            MotumError::UnknownMonitorKind { .. } => 101,
            MotumError::ConstraintInitializationFailed { .. } => 102,
            MotumError::InvalidGoal(_) => 103,
            MotumError::InfeasibleSolve(_) => 200,
            MotumError::Cancelled(_) => 300,
            MotumError::Aborted { .. } => 301,
            MotumError::Timeout { .. } => 400,
            MotumError::TrajectoryTooLong { .. } => 401,
            MotumError::SelfCollisionViolated { .. } => 500,
            MotumError::Hardware { .. } => 600,
        }
    }

    /// Whether this error ends the episode when raised inside a tick.
    ///
    /// Only a sensor timeout is retried.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MotumError::Timeout { .. })
    }
}
