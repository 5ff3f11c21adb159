//! Built-in constraint kinds.
//!
//! | Kind | Task | Constraints |
//! |---|---|---|
//! | [`JointPositionList`] | `joint goal` | one equality per joint |
//! | [`JointPosition`] | `joint goal` | one equality |
//! | [`JointVelocityLimit`] | `velocity limit` | one velocity bound per joint |
//! | [`CartesianPosition`] | `position` | x/y/z equalities on the tip origin |
//! | [`AlignPlanes`] | `align planes` | x/y/z equalities on the rotated tip normal |

use std::collections::BTreeMap;

use motum_types::{
    Axis, Constraint, Expression, MotumError, PointStamped, Vector3Stamped, WEIGHT_ABOVE_CA,
    WEIGHT_BELOW_CA,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::goal::{BuildContext, ConstraintFactory, GoalTask, init_failure};

fn default_weight_below() -> f64 {
    WEIGHT_BELOW_CA
}

fn default_weight_above() -> f64 {
    WEIGHT_ABOVE_CA
}

fn default_joint_velocity() -> f64 {
    1.0
}

fn default_position_velocity() -> f64 {
    0.2
}

fn default_rotation_velocity() -> f64 {
    0.5
}

// ────────────────────────────────────────────────────────────────────────────
// Joint space
// ────────────────────────────────────────────────────────────────────────────

/// Drive several joints to goal positions.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JointPositionList {
    pub goal_state: BTreeMap<String, f64>,
    #[serde(default = "default_weight_below")]
    pub weight: f64,
    #[serde(default = "default_joint_velocity")]
    pub max_velocity: f64,
}

impl JointPositionList {
    fn task<K: ConstraintFactory>(&self, ctx: &BuildContext<'_>) -> Result<GoalTask, MotumError> {
        if self.goal_state.is_empty() {
            return Err(init_failure::<K>("goal_state: must name at least one joint"));
        }
        let mut task = GoalTask::new("joint goal");
        for (joint_name, &goal) in &self.goal_state {
            let Some(joint) = ctx.model.joint(joint_name) else {
                return Err(init_failure::<K>(format!(
                    "goal_state.{joint_name}: not a controlled joint"
                )));
            };
            let goal = joint.limits.clamp_position(goal);
            let velocity = self.max_velocity.min(joint.limits.velocity);
            task = task
                .with_constraint(Constraint::equality(
                    joint_name.clone(),
                    Expression::joint(joint_name),
                    goal,
                    velocity,
                    self.weight,
                ))
                .with_debug(
                    format!("{joint_name}/error"),
                    Expression::Sum {
                        terms: vec![Expression::constant(goal), Expression::joint(joint_name).scaled(-1.0)],
                    },
                );
        }
        Ok(task)
    }
}

impl ConstraintFactory for JointPositionList {
    const KIND: &'static str = "JointPositionList";

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError> {
        Ok(vec![self.task::<Self>(ctx)?])
    }
}

/// Single-joint shorthand for [`JointPositionList`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JointPosition {
    pub joint_name: String,
    pub goal: f64,
    #[serde(default = "default_weight_below")]
    pub weight: f64,
    #[serde(default = "default_joint_velocity")]
    pub max_velocity: f64,
}

impl ConstraintFactory for JointPosition {
    const KIND: &'static str = "JointPosition";

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError> {
        if ctx.model.joint(&self.joint_name).is_none() {
            return Err(init_failure::<Self>(format!(
                "joint_name: \"{}\" is not a controlled joint",
                self.joint_name
            )));
        }
        let list = JointPositionList {
            goal_state: BTreeMap::from([(self.joint_name, self.goal)]),
            weight: self.weight,
            max_velocity: self.max_velocity,
        };
        Ok(vec![list.task::<Self>(ctx)?])
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JointVelocityLimit {
    pub joint_names: Vec<String>,
    #[serde(default = "default_joint_velocity")]
    pub max_velocity: f64,
    #[serde(default = "default_weight_below")]
    pub weight: f64,
    /// Forbid any slack above the limit.
    #[serde(default)]
    pub hard: bool,
}

impl ConstraintFactory for JointVelocityLimit {
    const KIND: &'static str = "JointVelocityLimit";

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError> {
        if self.joint_names.is_empty() {
            return Err(init_failure::<Self>("joint_names: must name at least one joint"));
        }
        if self.max_velocity <= 0.0 {
            return Err(init_failure::<Self>("max_velocity: must be positive"));
        }
        let mut task = GoalTask::new("velocity limit");
        for (i, joint_name) in self.joint_names.iter().enumerate() {
            let Some(joint) = ctx.model.joint(joint_name) else {
                return Err(init_failure::<Self>(format!(
                    "joint_names[{i}]: \"{joint_name}\" is not a controlled joint"
                )));
            };
            let mut constraint = Constraint::velocity(
                joint_name.clone(),
                Expression::joint(joint_name),
                self.max_velocity.min(joint.limits.velocity),
                self.weight,
            );
            if self.hard {
                constraint.upper_slack_limit = Some(0.0);
            }
            task = task.with_constraint(constraint);
        }
        Ok(vec![task])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cartesian space
// ────────────────────────────────────────────────────────────────────────────

/// Move the origin of `tip_link` to a point, expressed in `root_link`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CartesianPosition {
    pub root_link: String,
    pub tip_link: String,
    pub goal_point: PointStamped,
    #[serde(default = "default_position_velocity")]
    pub reference_velocity: f64,
    #[serde(default = "default_weight_above")]
    pub weight: f64,
}

impl ConstraintFactory for CartesianPosition {
    const KIND: &'static str = "CartesianPosition";

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError> {
        // Both lookups fail with InvalidGoal on an unknown frame.
        let goal = ctx
            .model
            .frame_pose(&self.root_link, &self.goal_point.frame_id, ctx.state)?
            .transform_point(self.goal_point.point);
        ctx.model.frame_pose(&self.root_link, &self.tip_link, ctx.state)?;

        let mut task = GoalTask::new("position");
        for axis in Axis::ALL {
            let expression = Expression::link_position(&self.root_link, &self.tip_link, axis);
            task = task
                .with_debug(format!("current/{}", axis.label()), expression.clone())
                .with_constraint(Constraint::equality(
                    axis.label(),
                    expression,
                    axis.pick(goal),
                    self.reference_velocity,
                    self.weight,
                ));
        }
        Ok(vec![task])
    }
}

/// Rotate `tip_link` so that `tip_normal` points along `goal_normal`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AlignPlanes {
    pub root_link: String,
    pub tip_link: String,
    pub goal_normal: Vector3Stamped,
    pub tip_normal: Vector3Stamped,
    #[serde(default = "default_rotation_velocity")]
    pub reference_velocity: f64,
    #[serde(default = "default_weight_above")]
    pub weight: f64,
}

impl ConstraintFactory for AlignPlanes {
    const KIND: &'static str = "AlignPlanes";

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError> {
        let goal = ctx
            .model
            .frame_pose(&self.root_link, &self.goal_normal.frame_id, ctx.state)?
            .transform_vector(self.goal_normal.vector)
            .normalized()
            .ok_or_else(|| init_failure::<Self>("goal_normal.vector: must be non-zero"))?;
        let local = ctx
            .model
            .frame_pose(&self.tip_link, &self.tip_normal.frame_id, ctx.state)?
            .transform_vector(self.tip_normal.vector)
            .normalized()
            .ok_or_else(|| init_failure::<Self>("tip_normal.vector: must be non-zero"))?;

        let mut task = GoalTask::new("align planes");
        for axis in Axis::ALL {
            let expression = Expression::LinkDirection {
                root: self.root_link.clone(),
                link: self.tip_link.clone(),
                local,
                axis,
            };
            task = task.with_constraint(Constraint::equality(
                axis.label(),
                expression,
                axis.pick(goal),
                self.reference_velocity,
                self.weight,
            ));
        }
        Ok(vec![task])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::ConstraintKind;
    use motum_hal::{SimRobotDescription, SimWorld};
    use motum_types::{Bounds, JointState, WeightClass};
    use serde_json::{Value, json};

    fn build(kind: ConstraintKind, params: Value) -> Result<Vec<GoalTask>, MotumError> {
        let world = SimWorld::new(SimRobotDescription::planar_arm()).unwrap();
        let state = JointState::default();
        let mut ctx = BuildContext {
            model: &world,
            state: &state,
            control_horizon: 5,
            sample_period: 0.05,
        };
        (kind.build)(&mut ctx, &params)
    }

    #[test]
    fn joint_position_list_clamps_goal_and_velocity() {
        let tasks = build(
            ConstraintKind::of::<JointPositionList>(),
            json!({"goal_state": {"slide_x": 3.0, "slide_y": 0.5}, "max_velocity": 5.0}),
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.name, "joint goal");
        assert_eq!(task.constraints.len(), 2);
        let x = &task.constraints[0];
        assert_eq!(x.name, "slide_x");
        assert_eq!(x.bounds, Bounds::Equality { target: 2.0 });
        assert_eq!(x.reference_velocity, 1.0);
        assert_eq!(x.weight_class, WeightClass::BelowCollisionAvoidance);
        assert!(task.debug.contains_key("slide_y/error"));
    }

    #[test]
    fn empty_goal_state_is_an_init_failure() {
        let err = build(ConstraintKind::of::<JointPositionList>(), json!({"goal_state": {}})).unwrap_err();
        let MotumError::ConstraintInitializationFailed { kind, cause, usage } = err else {
            panic!("unexpected error");
        };
        assert_eq!(kind, "JointPositionList");
        assert!(cause.starts_with("goal_state"));
        assert!(usage.unwrap().contains("goal_state"));
    }

    #[test]
    fn unknown_joint_is_an_init_failure() {
        let err = build(ConstraintKind::of::<JointPosition>(), json!({"joint_name": "elbow", "goal": 1.0}))
            .unwrap_err();
        assert!(matches!(
            err,
            MotumError::ConstraintInitializationFailed { ref kind, ref cause, .. }
                if kind == "JointPosition" && cause == "joint_name: \"elbow\" is not a controlled joint"
        ));
        let err = build(
            ConstraintKind::of::<JointPositionList>(),
            json!({"goal_state": {"slide_x": 0.1, "elbow": 1.0}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("goal_state.elbow"));
    }

    #[test]
    fn misspelled_field_names_its_path() {
        let err = build(
            ConstraintKind::of::<CartesianPosition>(),
            json!({
                "root_link": "base_link",
                "tip_link": "tool_tip",
                "goal_point": {"frame_id": "map", "piont": {"x": 1.0}}
            }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MotumError::ConstraintInitializationFailed { ref cause, .. } if cause == "goal_point.piont: unknown field"
        ));
    }

    #[test]
    fn cartesian_goal_is_transformed_into_root() {
        let tasks = build(
            ConstraintKind::of::<CartesianPosition>(),
            json!({
                "root_link": "base_link",
                "tip_link": "tool_tip",
                "goal_point": {"frame_id": "map", "point": {"x": 1.5, "y": 0.25, "z": 0.6}}
            }),
        )
        .unwrap();
        let targets: Vec<_> = tasks[0].constraints.iter().map(|c| (c.name.as_str(), c.bounds.clone())).collect();
        assert_eq!(
            targets,
            vec![
                ("x", Bounds::Equality { target: 0.5 }),
                ("y", Bounds::Equality { target: 0.25 }),
                ("z", Bounds::Equality { target: 0.6 }),
            ]
        );
        assert_eq!(tasks[0].constraints[0].weight_class, WeightClass::AboveCollisionAvoidance);
    }

    #[test]
    fn unknown_frame_is_an_invalid_goal() {
        let err = build(
            ConstraintKind::of::<CartesianPosition>(),
            json!({
                "root_link": "base_link",
                "tip_link": "tool_tip",
                "goal_point": {"frame_id": "moon", "point": {}}
            }),
        )
        .unwrap_err();
        assert!(matches!(err, MotumError::InvalidGoal(_)));
    }

    #[test]
    fn velocity_limit_respects_joint_limit_and_hardness() {
        let tasks = build(
            ConstraintKind::of::<JointVelocityLimit>(),
            json!({"joint_names": ["slide_y"], "max_velocity": 3.0, "hard": true}),
        )
        .unwrap();
        let c = &tasks[0].constraints[0];
        assert_eq!(c.bounds, Bounds::Velocity { lower: -1.0, upper: 1.0 });
        assert_eq!(c.upper_slack_limit, Some(0.0));
    }

    #[test]
    fn align_planes_rejects_zero_normal() {
        let err = build(
            ConstraintKind::of::<AlignPlanes>(),
            json!({
                "root_link": "base_link",
                "tip_link": "tool_tip",
                "goal_normal": {"frame_id": "base_link", "vector": {"z": 1.0}},
                "tip_normal": {"frame_id": "tool_tip", "vector": {}}
            }),
        )
        .unwrap_err();
        assert!(matches!(err, MotumError::ConstraintInitializationFailed { .. }));
    }

    #[test]
    fn align_planes_yields_three_direction_constraints() {
        let tasks = build(
            ConstraintKind::of::<AlignPlanes>(),
            json!({
                "root_link": "base_link",
                "tip_link": "tool_tip",
                "goal_normal": {"frame_id": "map", "vector": {"z": 2.0}},
                "tip_normal": {"frame_id": "tool_tip", "vector": {"z": 1.0}}
            }),
        )
        .unwrap();
        assert_eq!(tasks[0].name, "align planes");
        assert_eq!(tasks[0].constraints.len(), 3);
        assert_eq!(tasks[0].constraints[2].bounds, Bounds::Equality { target: 1.0 });
    }
}
