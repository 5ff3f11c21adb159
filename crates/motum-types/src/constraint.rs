//! Symbolic constraints handed to the solver.
//!
//! A [`Constraint`] pairs an [`Expression`] over the robot's joint state with
//! [`Bounds`] on it, a weight, and a [`WeightClass`] the solver uses for
//! priority ordering.  Constraints are immutable after creation; the goal
//! compiler and collision synthesizer build them, the solver only reads them.

use serde::{Deserialize, Serialize};

use crate::geometry::Vector3;

// ────────────────────────────────────────────────────────────────────────────
// Weights
// ────────────────────────────────────────────────────────────────────────────

pub const WEIGHT_MAX: f64 = 10_000.0;
pub const WEIGHT_ABOVE_CA: f64 = 2_500.0;
pub const WEIGHT_COLLISION_AVOIDANCE: f64 = 50.0;
pub const WEIGHT_BELOW_CA: f64 = 1.0;
pub const WEIGHT_MIN: f64 = 0.0;

/// Priority band of a constraint relative to collision avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightClass {
    BelowCollisionAvoidance,
    CollisionAvoidance,
    AboveCollisionAvoidance,
}

impl WeightClass {
    /// Classify a raw weight against the collision-avoidance weight.
    pub fn of(weight: f64) -> Self {
        if weight > WEIGHT_COLLISION_AVOIDANCE {
            WeightClass::AboveCollisionAvoidance
        } else if weight < WEIGHT_COLLISION_AVOIDANCE {
            WeightClass::BelowCollisionAvoidance
        } else {
            WeightClass::CollisionAvoidance
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Expression
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn pick(self, v: Vector3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// A scalar expression over the joint state, evaluated by the world model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expression {
    Constant { value: f64 },
    /// Position of a single joint.
    Joint { name: String },
    /// One coordinate of `link`'s origin expressed in `root`.
    LinkPosition { root: String, link: String, axis: Axis },
    /// One coordinate of a `link`-fixed direction rotated into `root`.
    LinkDirection {
        root: String,
        link: String,
        local: Vector3,
        axis: Axis,
    },
    Scaled { factor: f64, term: Box<Expression> },
    Sum { terms: Vec<Expression> },
}

impl Expression {
    pub fn constant(value: f64) -> Self {
        Expression::Constant { value }
    }

    pub fn joint(name: impl Into<String>) -> Self {
        Expression::Joint { name: name.into() }
    }

    pub fn link_position(root: impl Into<String>, link: impl Into<String>, axis: Axis) -> Self {
        Expression::LinkPosition {
            root: root.into(),
            link: link.into(),
            axis,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Expression::Scaled {
            factor,
            term: Box::new(self),
        }
    }

    /// `normal · origin(link)` with both expressed in `root`.
    pub fn dot_link_position(root: &str, link: &str, normal: Vector3) -> Self {
        Expression::Sum {
            terms: Axis::ALL
                .iter()
                .map(|&axis| Expression::link_position(root, link, axis).scaled(axis.pick(normal)))
                .collect(),
        }
    }

    /// `normal · (origin(link_a) - origin(link_b))` with everything in `root`.
    pub fn dot_link_offset(root: &str, link_a: &str, link_b: &str, normal: Vector3) -> Self {
        Expression::Sum {
            terms: vec![
                Expression::dot_link_position(root, link_a, normal),
                Expression::dot_link_position(root, link_b, normal).scaled(-1.0),
            ],
        }
    }

    /// Names of every joint read directly by this expression.
    pub fn joints(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_joints(&mut out);
        out
    }

    fn collect_joints<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expression::Joint { name } => out.push(name),
            Expression::Scaled { term, .. } => term.collect_joints(out),
            Expression::Sum { terms } => terms.iter().for_each(|t| t.collect_joints(out)),
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Constraint
// ────────────────────────────────────────────────────────────────────────────

/// Bounds placed on a constraint's expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Bounds {
    /// Soft equality: drive the expression to `target`.
    Equality { target: f64 },
    /// Soft inequality on the change of the expression over the horizon.
    /// `upper = None` is unbounded.
    Inequality { lower: f64, upper: Option<f64> },
    /// Bounds on the expression's rate of change.
    Velocity { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// `{goal}/{task}/{constraint}` once compiled; the local name before that.
    pub name: String,
    pub expression: Expression,
    pub bounds: Bounds,
    pub weight: f64,
    pub weight_class: WeightClass,
    /// Rate at which the solver may close the error, per second.
    pub reference_velocity: f64,
    /// Cap on the slack the solver may use above the upper bound.
    #[serde(default)]
    pub upper_slack_limit: Option<f64>,
}

impl Constraint {
    pub fn equality(
        name: impl Into<String>,
        expression: Expression,
        target: f64,
        reference_velocity: f64,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            expression,
            bounds: Bounds::Equality { target },
            weight,
            weight_class: WeightClass::of(weight),
            reference_velocity,
            upper_slack_limit: None,
        }
    }

    pub fn velocity(
        name: impl Into<String>,
        expression: Expression,
        max_velocity: f64,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            expression,
            bounds: Bounds::Velocity {
                lower: -max_velocity,
                upper: max_velocity,
            },
            weight,
            weight_class: WeightClass::of(weight),
            reference_velocity: max_velocity,
            upper_slack_limit: None,
        }
    }

    /// Return a copy whose name is prefixed with `goal/task/`.
    pub fn qualified(mut self, goal: &str, task: &str) -> Self {
        self.name = format!("{goal}/{task}/{}", self.name);
        self
    }
}
