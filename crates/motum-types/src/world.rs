//! Joint and proximity snapshots read from the world.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Vector3;

/// Kinematic limits of one controllable joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    #[serde(default)]
    pub lower_position: Option<f64>,
    #[serde(default)]
    pub upper_position: Option<f64>,
    pub velocity: f64,
    #[serde(default)]
    pub acceleration: Option<f64>,
    #[serde(default)]
    pub jerk: Option<f64>,
}

impl JointLimits {
    /// Position limits ordered and not NaN, velocity limit finite and non-negative.
    pub fn check(&self) -> Result<(), String> {
        if let Some(lower) = self.lower_position
            && lower.is_nan()
        {
            return Err("lower_position is NaN".to_string());
        }
        if let Some(upper) = self.upper_position
            && upper.is_nan()
        {
            return Err("upper_position is NaN".to_string());
        }
        if let (Some(lower), Some(upper)) = (self.lower_position, self.upper_position)
            && lower > upper
        {
            return Err(format!("lower_position ({lower}) exceeds upper_position ({upper})"));
        }
        if !self.velocity.is_finite() || self.velocity < 0.0 {
            return Err(format!("velocity must be finite and non-negative, got {}", self.velocity));
        }
        Ok(())
    }

    /// Unchecked limits never panic; the upper bound wins when they cross.
    pub fn clamp_position(&self, position: f64) -> f64 {
        let lower = self.lower_position.unwrap_or(f64::NEG_INFINITY);
        let upper = self.upper_position.unwrap_or(f64::INFINITY);
        position.max(lower).min(upper)
    }
}

/// Per-joint free-variable bounds handed to the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeVariableBounds {
    pub joint: String,
    pub lower_position: Option<f64>,
    pub upper_position: Option<f64>,
    pub velocity: f64,
    pub acceleration: Option<f64>,
    pub jerk: Option<f64>,
}

/// An inbound joint-state sample from the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub positions: BTreeMap<String, f64>,
    #[serde(default)]
    pub velocities: BTreeMap<String, f64>,
}

/// The world's joint state as seen by one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub positions: BTreeMap<String, f64>,
    pub velocities: BTreeMap<String, f64>,
}

impl JointState {
    pub fn position(&self, joint: &str) -> Option<f64> {
        self.positions.get(joint).copied()
    }

    pub fn velocity(&self, joint: &str) -> f64 {
        self.velocities.get(joint).copied().unwrap_or(0.0)
    }

    /// Overwrite positions (and any reported velocities) from a sample.
    pub fn absorb(&mut self, sample: &JointSample) {
        for (joint, q) in &sample.positions {
            self.positions.insert(joint.clone(), *q);
        }
        for (joint, v) in &sample.velocities {
            self.velocities.insert(joint.clone(), *v);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Proximity
// ────────────────────────────────────────────────────────────────────────────

/// Key of an external contact: which robot link is near which body/link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactKey {
    pub robot_link: String,
    pub body: String,
    pub link: String,
}

impl ContactKey {
    pub fn new(robot_link: impl Into<String>, body: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            robot_link: robot_link.into(),
            body: body.into(),
            link: link.into(),
        }
    }
}

/// Nearest-contact geometry between two bodies, in the robot root frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Signed distance; negative means penetration.
    pub distance: f64,
    /// Unit normal pointing from the other body towards link a.
    pub normal: Vector3,
    pub point_on_a: Vector3,
    pub point_on_b: Vector3,
}

/// One tick's proximity snapshot, owned by the world model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityResult {
    pub external: BTreeMap<ContactKey, Contact>,
    /// Keyed by the raw `(link_a, link_b)` pair as reported by the world model.
    pub self_collision: BTreeMap<(String, String), Contact>,
}

impl ProximityResult {
    /// External contacts of `robot_link`, nearest first.
    pub fn external_for_link(&self, robot_link: &str) -> Vec<(&ContactKey, &Contact)> {
        let mut contacts: Vec<_> = self
            .external
            .iter()
            .filter(|(key, _)| key.robot_link == robot_link)
            .collect();
        contacts.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance));
        contacts
    }
}
