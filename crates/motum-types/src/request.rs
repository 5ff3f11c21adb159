//! The motion request that opens a control episode.
//!
//! A [`MotionRequest`] is immutable once received.  Constraint and monitor
//! parameters stay as raw JSON here; each kind's typed schema is applied by
//! the goal compiler so that a bad field is reported against the kind that
//! owns it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_parameters() -> Value {
    Value::Object(Default::default())
}

/// One goal episode's worth of intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionRequest {
    /// Monitors referenced by name from constraint specs and other monitors.
    #[serde(default)]
    pub monitors: Vec<MonitorSpec>,
    /// Constraint specifications, compiled in order.
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    /// Ordered collision directives; later entries override earlier ones.
    #[serde(default)]
    pub collisions: Vec<CollisionEntry>,
    /// Only check whether the goal is reachable: free-variable bounds are not
    /// computed for the solver.
    #[serde(default)]
    pub check_reachability: bool,
}

/// A named constraint kind plus its parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Registered constraint-kind name, e.g. `"JointPositionList"`.
    pub kind: String,
    /// Goal name used as the first segment of every constraint name.
    /// Defaults to the kind name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
    #[serde(default)]
    pub start_monitors: Vec<String>,
    #[serde(default)]
    pub hold_monitors: Vec<String>,
    #[serde(default)]
    pub end_monitors: Vec<String>,
}

impl ConstraintSpec {
    /// A spec with no name override and no monitor wiring.
    pub fn new(kind: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            parameters,
            start_monitors: Vec::new(),
            hold_monitors: Vec::new(),
            end_monitors: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_start_monitors<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.start_monitors = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hold_monitors<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.hold_monitors = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_end_monitors<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.end_monitors = names.into_iter().map(Into::into).collect();
        self
    }
}

/// A named monitor kind plus its parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// Unique within the request.
    pub name: String,
    /// Registered monitor-kind name, e.g. `"JointGoalReached"`.
    pub kind: String,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
    /// The monitor is only evaluated once all of these were true on the
    /// previous tick.
    #[serde(default)]
    pub start_monitors: Vec<String>,
}

impl MonitorSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            parameters,
            start_monitors: Vec::new(),
        }
    }

    pub fn with_start_monitors<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.start_monitors = names.into_iter().map(Into::into).collect();
        self
    }
}

/// What a [`CollisionEntry`] allows or forbids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionDirective {
    /// Avoid every collision; `min_distance` becomes the soft-threshold override.
    AvoidAll,
    /// Allow every collision, external and self.
    AllowAll,
    /// Allow self collisions only.
    AllowAllSelf,
    /// Avoid contacts between one robot link and one environment body.
    AvoidPair { robot_link: String, body: String },
    /// Ignore contacts between one robot link and one environment body.
    AllowPair { robot_link: String, body: String },
}

/// One entry of the ordered collision directive list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionEntry {
    #[serde(flatten)]
    pub directive: CollisionDirective,
    #[serde(default)]
    pub min_distance: Option<f64>,
}

impl CollisionEntry {
    pub fn avoid_all(min_distance: f64) -> Self {
        Self {
            directive: CollisionDirective::AvoidAll,
            min_distance: Some(min_distance),
        }
    }

    pub fn allow_all() -> Self {
        Self {
            directive: CollisionDirective::AllowAll,
            min_distance: None,
        }
    }

    pub fn allow_all_self() -> Self {
        Self {
            directive: CollisionDirective::AllowAllSelf,
            min_distance: None,
        }
    }

    pub fn allow_pair(robot_link: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            directive: CollisionDirective::AllowPair {
                robot_link: robot_link.into(),
                body: body.into(),
            },
            min_distance: None,
        }
    }

    pub fn avoid_pair(robot_link: impl Into<String>, body: impl Into<String>, min_distance: f64) -> Self {
        Self {
            directive: CollisionDirective::AvoidPair {
                robot_link: robot_link.into(),
                body: body.into(),
            },
            min_distance: Some(min_distance),
        }
    }
}
