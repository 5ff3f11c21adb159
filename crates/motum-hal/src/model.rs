//! World-model seams: kinematics and proximity queries.
//!
//! The controller never owns a physics or collision engine.  It reads the
//! robot through [`KinematicModel`] and asks a [`ProximityService`] for the
//! nearest contacts once per tick.  [`evaluate`] turns a symbolic
//! [`Expression`] into a number against a model and a joint state.

use std::cmp::Ordering;

use motum_types::{Expression, JointLimits, JointState, MotumError, ProximityResult};

use crate::frames::Transform3D;

/// A joint the controller may command.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlledJoint {
    pub name: String,
    /// Link moved directly by this joint.
    pub child_link: String,
    pub limits: JointLimits,
    /// Links with collision geometry moved by this joint and no controlled
    /// joint in between.
    pub collision_links: Vec<String>,
    /// No controlled joint further down the chain (an end effector).
    pub is_leaf: bool,
}

/// Read-only kinematic view of the robot and its surroundings.
pub trait KinematicModel: Send + Sync {
    fn root_link(&self) -> &str;

    /// Controllable joints in a fixed, deterministic order.
    fn controlled_joints(&self) -> &[ControlledJoint];

    fn joint(&self, name: &str) -> Option<&ControlledJoint> {
        self.controlled_joints().iter().find(|j| j.name == name)
    }

    /// Pose of `frame` expressed in `root` at the given joint state.
    ///
    /// # Errors
    ///
    /// [`MotumError::InvalidGoal`] when either frame is unknown.
    fn frame_pose(&self, root: &str, frame: &str, state: &JointState) -> Result<Transform3D, MotumError>;

    /// The nearest link at or above `link` that is moved by a controlled joint.
    fn reduce_to_controlled(&self, link: &str) -> String;

    /// Total order over links used to canonicalise link pairs.
    fn link_order(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Proximity query service backed by the world's collision engine.
pub trait ProximityService: Send {
    /// Contacts no farther apart than `max_distance`.
    fn query(&mut self, state: &JointState, max_distance: f64) -> Result<ProximityResult, MotumError>;
}

/// Evaluate `expression` for `state`.
pub fn evaluate(
    expression: &Expression,
    model: &dyn KinematicModel,
    state: &JointState,
) -> Result<f64, MotumError> {
    match expression {
        Expression::Constant { value } => Ok(*value),
        Expression::Joint { name } => state
            .position(name)
            .ok_or_else(|| MotumError::InvalidGoal(format!("no position for joint \"{name}\""))),
        Expression::LinkPosition { root, link, axis } => {
            let pose = model.frame_pose(root, link, state)?;
            Ok(axis.pick(pose.translation))
        }
        Expression::LinkDirection {
            root,
            link,
            local,
            axis,
        } => {
            let pose = model.frame_pose(root, link, state)?;
            Ok(axis.pick(pose.transform_vector(*local)))
        }
        Expression::Scaled { factor, term } => Ok(factor * evaluate(term, model, state)?),
        Expression::Sum { terms } => terms
            .iter()
            .map(|t| evaluate(t, model, state))
            .sum::<Result<f64, _>>(),
    }
}

/// Central-difference partial derivative of `expression` along `joint`.
pub fn partial_derivative(
    expression: &Expression,
    model: &dyn KinematicModel,
    state: &JointState,
    joint: &str,
) -> Result<f64, MotumError> {
    const H: f64 = 1e-6;
    let Some(q) = state.position(joint) else {
        return Ok(0.0);
    };
    let mut probe = state.clone();
    probe.positions.insert(joint.to_string(), q + H);
    let ahead = evaluate(expression, model, &probe)?;
    probe.positions.insert(joint.to_string(), q - H);
    let behind = evaluate(expression, model, &probe)?;
    Ok((ahead - behind) / (2.0 * H))
}
