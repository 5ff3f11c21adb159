//! Damped least-squares reference solver.
//!
//! Good enough to close the loop in simulation: every active constraint
//! contributes a weighted row `gradient · q̇ = desired_rate` to the normal
//! equations, which are solved with Tikhonov damping.  Velocity bounds and
//! joint limits are enforced afterwards by scaling and clamping.
//!
//! | Bounds | Desired rate |
//! |---|---|
//! | `Equality { target }` | `(target - value) / (dt · horizon)`, clamped to the reference velocity |
//! | `Inequality { lower, .. }` with `lower > 0` | `lower / (dt · horizon)` |
//! | `Inequality { upper: Some(u), .. }` with `u < 0` | `u / (dt · horizon)` |
//! | `Velocity { lower, upper }` | none; the rate is bounded after solving |

use std::collections::BTreeMap;

use motum_types::{Bounds, MotumError};

use crate::model::{KinematicModel, evaluate, partial_derivative};
use crate::solver::{Solver, SolverInput, SolverOutput};

#[derive(Debug, Clone)]
pub struct DampedLeastSquares {
    damping: f64,
}

impl Default for DampedLeastSquares {
    fn default() -> Self {
        Self { damping: 1e-4 }
    }
}

impl DampedLeastSquares {
    pub fn new(damping: f64) -> Box<Self> {
        Box::new(Self { damping })
    }
}

struct RateBound {
    gradient: Vec<f64>,
    lower: f64,
    upper: f64,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting.  `None` if singular.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

impl Solver for DampedLeastSquares {
    fn solve(
        &mut self,
        input: &SolverInput<'_>,
        model: &dyn KinematicModel,
    ) -> Result<SolverOutput, MotumError> {
        let joints = model.controlled_joints();
        let n = joints.len();
        let horizon = input.control_horizon.max(1);
        let horizon_time = input.sample_period * horizon as f64;
        if horizon_time <= 0.0 {
            return Err(MotumError::InfeasibleSolve(format!(
                "non-positive planning window {horizon_time}"
            )));
        }

        let mut a = vec![vec![0.0; n]; n];
        let mut b = vec![0.0; n];
        for (i, row) in a.iter_mut().enumerate() {
            row[i] = self.damping;
        }
        let mut rate_bounds = Vec::new();

        for (name, constraint) in input.constraints {
            let gradient = joints
                .iter()
                .map(|j| partial_derivative(&constraint.expression, model, input.state, &j.name))
                .collect::<Result<Vec<f64>, _>>()?;
            let desired = match constraint.bounds {
                Bounds::Equality { target } => {
                    let error = target - evaluate(&constraint.expression, model, input.state)?;
                    let limit = constraint.reference_velocity.abs();
                    Some((error / horizon_time).clamp(-limit, limit))
                }
                Bounds::Inequality { lower, upper } => {
                    if lower > 0.0 {
                        Some(lower / horizon_time)
                    } else {
                        upper.filter(|u| *u < 0.0).map(|u| u / horizon_time)
                    }
                }
                Bounds::Velocity { lower, upper } => {
                    rate_bounds.push(RateBound {
                        gradient: gradient.clone(),
                        lower,
                        upper,
                    });
                    None
                }
            };
            let Some(desired) = desired else { continue };
            if !desired.is_finite() {
                return Err(MotumError::InfeasibleSolve(format!(
                    "constraint \"{name}\" has a non-finite target"
                )));
            }
            let w = constraint.weight;
            if w <= 0.0 {
                continue;
            }
            for r in 0..n {
                b[r] += w * desired * gradient[r];
                for s in 0..n {
                    a[r][s] += w * gradient[r] * gradient[s];
                }
            }
        }

        let mut qdot = solve_linear(a, b)
            .ok_or_else(|| MotumError::InfeasibleSolve("singular normal equations".into()))?;

        for bound in &rate_bounds {
            let rate = dot(&bound.gradient, &qdot);
            let scale = if rate > bound.upper && rate > 0.0 {
                bound.upper.max(0.0) / rate
            } else if rate < bound.lower && rate < 0.0 {
                bound.lower.min(0.0) / rate
            } else {
                1.0
            };
            qdot.iter_mut().for_each(|v| *v *= scale);
        }

        let mut command = BTreeMap::new();
        for (joint, v) in joints.iter().zip(qdot) {
            let bounds = input.free_variables.get(&joint.name);
            let vmax = bounds.map_or(joint.limits.velocity, |b| b.velocity);
            let mut v = v.clamp(-vmax, vmax);
            if let Some(q) = input.state.position(&joint.name) {
                let lower = bounds.map_or(joint.limits.lower_position, |b| b.lower_position);
                let upper = bounds.map_or(joint.limits.upper_position, |b| b.upper_position);
                if let Some(up) = upper {
                    v = v.min(((up - q) / input.sample_period).max(0.0));
                }
                if let Some(lo) = lower {
                    v = v.max(((lo - q) / input.sample_period).min(0.0));
                }
            }
            if !v.is_finite() {
                return Err(MotumError::InfeasibleSolve(format!(
                    "non-finite velocity for joint \"{}\"",
                    joint.name
                )));
            }
            command.insert(joint.name.clone(), v);
        }

        Ok(SolverOutput {
            commands: vec![command; horizon],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimRobotDescription, SimWorld};
    use motum_types::{Axis, Constraint, Expression, JointState, WEIGHT_ABOVE_CA, WEIGHT_BELOW_CA};

    fn world() -> SimWorld {
        SimWorld::new(SimRobotDescription::planar_arm()).unwrap()
    }

    fn state(x: f64, y: f64) -> JointState {
        let mut s = JointState::default();
        s.positions.insert("slide_x".into(), x);
        s.positions.insert("slide_y".into(), y);
        s
    }

    fn solve(constraints: &BTreeMap<String, Constraint>, s: &JointState) -> Result<SolverOutput, MotumError> {
        let free = BTreeMap::new();
        let input = SolverInput {
            constraints,
            free_variables: &free,
            control_horizon: 5,
            sample_period: 0.05,
            state: s,
        };
        DampedLeastSquares::default().solve(&input, &world())
    }

    #[test]
    fn solve_linear_two_by_two() {
        let x = solve_linear(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
        assert!(solve_linear(vec![vec![0.0]], vec![1.0]).is_none());
    }

    #[test]
    fn equality_moves_joint_towards_target() {
        let c = Constraint::equality("x", Expression::joint("slide_x"), 0.5, 1.0, WEIGHT_BELOW_CA);
        let set = BTreeMap::from([(c.name.clone(), c)]);
        let out = solve(&set, &state(0.0, 0.0)).unwrap();
        assert_eq!(out.commands.len(), 5);
        let v = out.next_command()["slide_x"];
        // error 0.5 over a 0.25 s window, capped at 1.0 m/s.
        assert!((v - 1.0).abs() < 1e-3, "v = {v}");
        assert!(out.next_command()["slide_y"].abs() < 1e-9);
    }

    #[test]
    fn cartesian_equality_uses_link_gradient() {
        let c = Constraint::equality(
            "y",
            Expression::link_position("base_link", "tool_tip", Axis::Y),
            -0.05,
            1.0,
            WEIGHT_ABOVE_CA,
        );
        let set = BTreeMap::from([(c.name.clone(), c)]);
        let v = solve(&set, &state(0.0, 0.0)).unwrap().next_command()["slide_y"];
        assert!((v + 0.2).abs() < 1e-3, "v = {v}");
    }

    #[test]
    fn velocity_bound_scales_the_command() {
        let goal = Constraint::equality("x", Expression::joint("slide_x"), 0.5, 1.0, WEIGHT_BELOW_CA);
        let limit = Constraint::velocity("vx", Expression::joint("slide_x"), 0.3, WEIGHT_BELOW_CA);
        let set = BTreeMap::from([(goal.name.clone(), goal), (limit.name.clone(), limit)]);
        let v = solve(&set, &state(0.0, 0.0)).unwrap().next_command()["slide_x"];
        assert!((v - 0.3).abs() < 1e-6, "v = {v}");
    }

    #[test]
    fn inactive_inequality_contributes_nothing() {
        let c = Constraint {
            name: "ca".into(),
            expression: Expression::joint("slide_x"),
            bounds: Bounds::Inequality {
                lower: -0.5,
                upper: Some(1e4),
            },
            weight: 50.0,
            weight_class: motum_types::WeightClass::CollisionAvoidance,
            reference_velocity: 0.2,
            upper_slack_limit: None,
        };
        let set = BTreeMap::from([(c.name.clone(), c)]);
        let v = solve(&set, &state(0.0, 0.0)).unwrap().next_command()["slide_x"];
        assert_eq!(v, 0.0);
    }

    #[test]
    fn position_limit_stops_motion_at_the_boundary() {
        let c = Constraint::equality("x", Expression::joint("slide_x"), 5.0, 1.0, WEIGHT_BELOW_CA);
        let set = BTreeMap::from([(c.name.clone(), c)]);
        let v = solve(&set, &state(2.0, 0.0)).unwrap().next_command()["slide_x"];
        assert_eq!(v, 0.0);
    }

    #[test]
    fn non_finite_target_is_infeasible() {
        let c = Constraint::equality("x", Expression::joint("slide_x"), f64::NAN, 1.0, WEIGHT_BELOW_CA);
        let set = BTreeMap::from([(c.name.clone(), c)]);
        assert!(matches!(
            solve(&set, &state(0.0, 0.0)),
            Err(MotumError::InfeasibleSolve(_))
        ));
    }
}
