//! Built-in monitor kinds.
//!
//! Every kind is a plain struct whose fields are its parameters, so the goal
//! compiler can deserialize a request's `parameters` object straight into it
//! and publish the JSON schema as usage text.
//!
//! | Kind | Family | True when |
//! |---|---|---|
//! | [`JointGoalReached`] | condition | every listed joint is within `threshold` of its goal |
//! | [`PositionReached`] | condition | the tip link is within `threshold` of the goal point |
//! | [`TimeAbove`] | condition | control time exceeds `threshold` |
//! | [`LocalMinimumReached`] | condition | all joint velocities have settled (after 1 s) |
//! | [`EndMotion`] | payload | always; ends the episode with success |
//! | [`CancelMotion`] | payload | never; raises [`MotumError::Aborted`] instead |
//! | [`SetMaxTrajectoryLength`] | payload | never; raises [`MotumError::TrajectoryTooLong`] past `length` |
//! | [`Sleep`] | payload | `seconds` have elapsed since first activation |
//! | [`Print`] | payload | always; logs `message` once |
//! | [`Alternator`] | payload | `floor(time) % modulo == 0` |

use std::collections::BTreeMap;

use motum_types::{MotumError, PointStamped};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use crate::monitor::{ConditionMonitor, MonitorContext, PayloadMonitor};

fn default_threshold() -> f64 {
    0.01
}

fn default_min_cut_off() -> f64 {
    0.01
}

fn default_max_cut_off() -> f64 {
    0.06
}

fn default_trajectory_length() -> f64 {
    15.0
}

fn default_modulo() -> u64 {
    2
}

// ────────────────────────────────────────────────────────────────────────────
// Condition monitors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JointGoalReached {
    pub goal_state: BTreeMap<String, f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl ConditionMonitor for JointGoalReached {
    fn kind(&self) -> &'static str {
        "JointGoalReached"
    }

    fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        for (joint, goal) in &self.goal_state {
            let current = ctx.state.position(joint).ok_or_else(|| {
                MotumError::InvalidGoal(format!("JointGoalReached: no position for joint \"{joint}\""))
            })?;
            if (current - goal).abs() > self.threshold {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PositionReached {
    pub root_link: String,
    pub tip_link: String,
    pub goal_point: PointStamped,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl ConditionMonitor for PositionReached {
    fn kind(&self) -> &'static str {
        "PositionReached"
    }

    fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        let goal = ctx
            .model
            .frame_pose(&self.root_link, &self.goal_point.frame_id, ctx.state)?
            .transform_point(self.goal_point.point);
        let tip = ctx.model.frame_pose(&self.root_link, &self.tip_link, ctx.state)?.translation;
        Ok(tip.sub(goal).norm() <= self.threshold)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimeAbove {
    pub threshold: f64,
}

impl ConditionMonitor for TimeAbove {
    fn kind(&self) -> &'static str {
        "TimeAbove"
    }

    fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        Ok(ctx.time > self.threshold)
    }
}

/// Settles when every controlled joint moves slower than a fraction of its
/// velocity limit.  Never true during the first second.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LocalMinimumReached {
    #[serde(default = "default_min_cut_off")]
    pub min_cut_off: f64,
    #[serde(default = "default_max_cut_off")]
    pub max_cut_off: f64,
    #[serde(default = "default_threshold")]
    pub joint_convergence_threshold: f64,
}

impl LocalMinimumReached {
    /// Cut-offs must be finite, non-negative, and ordered.
    pub fn check(&self) -> Result<(), String> {
        if !(self.min_cut_off.is_finite() && self.max_cut_off.is_finite()) {
            return Err("min_cut_off and max_cut_off must be finite".into());
        }
        if self.min_cut_off < 0.0 {
            return Err(format!("min_cut_off: must be non-negative, got {}", self.min_cut_off));
        }
        if self.min_cut_off > self.max_cut_off {
            return Err(format!(
                "min_cut_off ({}) exceeds max_cut_off ({})",
                self.min_cut_off, self.max_cut_off
            ));
        }
        Ok(())
    }
}

impl ConditionMonitor for LocalMinimumReached {
    fn kind(&self) -> &'static str {
        "LocalMinimumReached"
    }

    fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        if ctx.time <= 1.0 {
            return Ok(false);
        }
        Ok(ctx.model.controlled_joints().iter().all(|joint| {
            // max/min rather than clamp: an unchecked pair must not panic.
            let cut_off = (joint.limits.velocity * self.joint_convergence_threshold)
                .max(self.min_cut_off)
                .min(self.max_cut_off);
            ctx.state.velocity(&joint.name).abs() < cut_off
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Payload monitors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EndMotion {}

impl PayloadMonitor for EndMotion {
    fn kind(&self) -> &'static str {
        "EndMotion"
    }

    fn run(&mut self, _ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        Ok(true)
    }

    fn ends_motion(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CancelMotion {
    pub error_message: String,
    /// Filled in from the monitor's name when compiled.
    #[serde(skip)]
    pub monitor: String,
}

impl PayloadMonitor for CancelMotion {
    fn kind(&self) -> &'static str {
        "CancelMotion"
    }

    fn run(&mut self, _ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        Err(MotumError::Aborted {
            monitor: self.monitor.clone(),
            message: self.error_message.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetMaxTrajectoryLength {
    #[serde(default = "default_trajectory_length")]
    pub length: f64,
}

impl PayloadMonitor for SetMaxTrajectoryLength {
    fn kind(&self) -> &'static str {
        "SetMaxTrajectoryLength"
    }

    fn run(&mut self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        if ctx.time > self.length {
            return Err(MotumError::TrajectoryTooLong { limit_s: self.length });
        }
        Ok(false)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Sleep {
    pub seconds: f64,
    #[serde(skip)]
    activated_at: Option<f64>,
}

impl PayloadMonitor for Sleep {
    fn kind(&self) -> &'static str {
        "Sleep"
    }

    fn run(&mut self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        let since = *self.activated_at.get_or_insert(ctx.time);
        Ok(ctx.time - since >= self.seconds)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Print {
    pub message: String,
    #[serde(skip)]
    printed: bool,
}

impl PayloadMonitor for Print {
    fn kind(&self) -> &'static str {
        "Print"
    }

    fn run(&mut self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        if !self.printed {
            info!(time = ctx.time, "{}", self.message);
            self.printed = true;
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Alternator {
    #[serde(default = "default_modulo")]
    pub modulo: u64,
}

impl PayloadMonitor for Alternator {
    fn kind(&self) -> &'static str {
        "Alternator"
    }

    fn run(&mut self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
        if self.modulo == 0 {
            return Err(MotumError::InvalidGoal("Alternator: modulo must be positive".into()));
        }
        Ok((ctx.time.max(0.0).floor() as u64) % self.modulo == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motum_hal::{SimRobotDescription, SimWorld};
    use motum_types::{JointState, Vector3};
    use serde_json::json;

    fn world() -> SimWorld {
        SimWorld::new(SimRobotDescription::planar_arm()).unwrap()
    }

    fn state(x: f64, y: f64) -> JointState {
        let mut s = JointState::default();
        s.positions.insert("slide_x".into(), x);
        s.positions.insert("slide_y".into(), y);
        s
    }

    #[test]
    fn joint_goal_reached_uses_threshold() {
        let w = world();
        let m: JointGoalReached = serde_json::from_value(json!({"goal_state": {"slide_x": 0.5}})).unwrap();
        let ctx = |s: &JointState| m.evaluate(&MonitorContext { model: &w, state: s, time: 0.0 });
        assert!(!ctx(&state(0.0, 0.0)).unwrap());
        assert!(ctx(&state(0.495, 0.0)).unwrap());
    }

    #[test]
    fn joint_goal_reached_rejects_unknown_joint() {
        let w = world();
        let m: JointGoalReached = serde_json::from_value(json!({"goal_state": {"elbow": 0.5}})).unwrap();
        let s = state(0.0, 0.0);
        let r = m.evaluate(&MonitorContext { model: &w, state: &s, time: 0.0 });
        assert!(matches!(r, Err(MotumError::InvalidGoal(_))));
    }

    #[test]
    fn position_reached_transforms_goal_frame() {
        let w = world();
        // "map" sits at (-1, 0, 0) in base_link, so (1.3, 0.2, 0.6) in map is
        // (0.3, 0.2, 0.6) in base_link, the tool tip at slide_x=0.3, slide_y=0.2.
        let m = PositionReached {
            root_link: "base_link".into(),
            tip_link: "tool_tip".into(),
            goal_point: PointStamped {
                frame_id: "map".into(),
                point: Vector3::new(1.3, 0.2, 0.6),
            },
            threshold: 0.01,
        };
        let s = state(0.3, 0.2);
        assert!(m.evaluate(&MonitorContext { model: &w, state: &s, time: 0.0 }).unwrap());
        let s = state(0.0, 0.0);
        assert!(!m.evaluate(&MonitorContext { model: &w, state: &s, time: 0.0 }).unwrap());
    }

    #[test]
    fn local_minimum_waits_for_first_second() {
        let w = world();
        let m: LocalMinimumReached = serde_json::from_value(json!({})).unwrap();
        let s = state(0.0, 0.0);
        assert!(!m.evaluate(&MonitorContext { model: &w, state: &s, time: 0.5 }).unwrap());
        assert!(m.evaluate(&MonitorContext { model: &w, state: &s, time: 1.5 }).unwrap());
        let mut moving = s.clone();
        moving.velocities.insert("slide_x".into(), 0.5);
        assert!(!m.evaluate(&MonitorContext { model: &w, state: &moving, time: 1.5 }).unwrap());
    }

    #[test]
    fn local_minimum_rejects_inverted_cut_offs() {
        let m: LocalMinimumReached =
            serde_json::from_value(json!({"min_cut_off": 0.1, "max_cut_off": 0.05})).unwrap();
        let err = m.check().unwrap_err();
        assert!(err.contains("exceeds max_cut_off"), "{err}");
        let ok: LocalMinimumReached = serde_json::from_value(json!({})).unwrap();
        assert!(ok.check().is_ok());

        // Unchecked, evaluation still returns instead of panicking.
        let w = world();
        let s = state(0.0, 0.0);
        assert!(m.evaluate(&MonitorContext { model: &w, state: &s, time: 1.5 }).is_ok());
    }

    #[test]
    fn sleep_counts_from_first_activation() {
        let w = world();
        let s = state(0.0, 0.0);
        let mut m: Sleep = serde_json::from_value(json!({"seconds": 1.0})).unwrap();
        assert!(!m.run(&MonitorContext { model: &w, state: &s, time: 2.0 }).unwrap());
        assert!(!m.run(&MonitorContext { model: &w, state: &s, time: 2.5 }).unwrap());
        assert!(m.run(&MonitorContext { model: &w, state: &s, time: 3.0 }).unwrap());
    }

    #[test]
    fn cancel_motion_aborts_with_message() {
        let w = world();
        let s = state(0.0, 0.0);
        let mut m: CancelMotion = serde_json::from_value(json!({"error_message": "stop"})).unwrap();
        m.monitor = "abort".into();
        let r = m.run(&MonitorContext { model: &w, state: &s, time: 0.0 });
        assert_eq!(
            r,
            Err(MotumError::Aborted {
                monitor: "abort".into(),
                message: "stop".into()
            })
        );
    }

    #[test]
    fn max_trajectory_length_trips_after_limit() {
        let w = world();
        let s = state(0.0, 0.0);
        let mut m = SetMaxTrajectoryLength { length: 2.0 };
        assert!(!m.run(&MonitorContext { model: &w, state: &s, time: 2.0 }).unwrap());
        assert!(matches!(
            m.run(&MonitorContext { model: &w, state: &s, time: 2.05 }),
            Err(MotumError::TrajectoryTooLong { .. })
        ));
    }

    #[test]
    fn alternator_flips_each_second() {
        let w = world();
        let s = state(0.0, 0.0);
        let mut m: Alternator = serde_json::from_value(json!({})).unwrap();
        assert!(m.run(&MonitorContext { model: &w, state: &s, time: 0.4 }).unwrap());
        assert!(!m.run(&MonitorContext { model: &w, state: &s, time: 1.4 }).unwrap());
        assert!(m.run(&MonitorContext { model: &w, state: &s, time: 2.0 }).unwrap());
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let r = serde_json::from_value::<TimeAbove>(json!({"threshold": 1.0, "treshold": 2.0}));
        assert!(r.unwrap_err().to_string().contains("treshold"));
    }
}
