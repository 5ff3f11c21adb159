//! [`GoalCompiler`] – turns a [`MotionRequest`] into an episode's tasks,
//! constraints, and monitors.
//!
//! Compilation is fail-fast: the first unknown kind, bad parameter, or
//! unresolvable reference aborts the whole request and nothing is returned.
//!
//! Constraints of every task are accumulated into one map keyed by the fully
//! qualified name `{goal}/{task}/{constraint}`.  When two goals produce the
//! same name the one compiled later replaces the earlier one.

use std::collections::BTreeMap;

use motum_hal::KinematicModel;
use motum_kernel::{MonitorEvaluator, MonitorRefs};
use motum_types::{
    CollisionEntry, Constraint, ControllerConfig, Expression, FreeVariableBounds, JointState,
    MonitorSummary, MotionRequest, MotumError,
};
use tracing::{debug, info, warn};

use crate::constraints::{AlignPlanes, CartesianPosition, JointPosition, JointPositionList, JointVelocityLimit};
use crate::goal::{BuildContext, ConstraintKind};
use crate::monitors::MonitorKind;
use crate::registry::Registry;

use motum_kernel::monitor_kinds::{
    Alternator, CancelMotion, EndMotion, JointGoalReached, LocalMinimumReached, PositionReached, Print,
    SetMaxTrajectoryLength, Sleep, TimeAbove,
};

/// A compiled task: a qualified name, its constraint names, and the monitors
/// that gate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// `{goal}/{task}`.
    pub name: String,
    pub goal: String,
    pub constraints: Vec<String>,
    pub monitors: MonitorRefs,
    pub start_monitors: Vec<String>,
    pub hold_monitors: Vec<String>,
    pub end_monitors: Vec<String>,
}

/// Everything an episode needs from its motion request.
pub struct CompiledGoal {
    pub tasks: Vec<Task>,
    pub constraints: BTreeMap<String, Constraint>,
    pub debug_expressions: BTreeMap<String, Expression>,
    /// Empty when the request only checks reachability.
    pub free_variables: BTreeMap<String, FreeVariableBounds>,
    pub monitors: MonitorEvaluator,
    pub monitor_summaries: Vec<MonitorSummary>,
    pub collisions: Vec<CollisionEntry>,
}

impl std::fmt::Debug for CompiledGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGoal")
            .field("tasks", &self.tasks)
            .field("constraints", &self.constraints.keys().collect::<Vec<_>>())
            .field("monitors", &self.monitor_summaries)
            .finish()
    }
}

pub struct GoalCompiler {
    constraint_kinds: Registry<ConstraintKind>,
    monitor_kinds: Registry<MonitorKind>,
}

impl Default for GoalCompiler {
    /// A compiler with every built-in kind registered.
    fn default() -> Self {
        let mut compiler = Self::empty();
        compiler.register_constraint(ConstraintKind::of::<JointPositionList>());
        compiler.register_constraint(ConstraintKind::of::<JointPosition>());
        compiler.register_constraint(ConstraintKind::of::<JointVelocityLimit>());
        compiler.register_constraint(ConstraintKind::of::<CartesianPosition>());
        compiler.register_constraint(ConstraintKind::of::<AlignPlanes>());

        compiler.register_monitor(MonitorKind::of::<JointGoalReached>());
        compiler.register_monitor(MonitorKind::of::<PositionReached>());
        compiler.register_monitor(MonitorKind::of::<TimeAbove>());
        compiler.register_monitor(MonitorKind::of::<LocalMinimumReached>());
        compiler.register_monitor(MonitorKind::of::<EndMotion>());
        compiler.register_monitor(MonitorKind::of::<CancelMotion>());
        compiler.register_monitor(MonitorKind::of::<SetMaxTrajectoryLength>());
        compiler.register_monitor(MonitorKind::of::<Sleep>());
        compiler.register_monitor(MonitorKind::of::<Print>());
        compiler.register_monitor(MonitorKind::of::<Alternator>());
        compiler
    }
}

impl GoalCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler with nothing registered.
    pub fn empty() -> Self {
        Self {
            constraint_kinds: Registry::new(),
            monitor_kinds: Registry::new(),
        }
    }

    pub fn register_constraint(&mut self, kind: ConstraintKind) {
        if self.constraint_kinds.register(kind.name, kind).is_some() {
            warn!(kind = kind.name, "constraint kind re-registered");
        }
    }

    pub fn register_monitor(&mut self, kind: MonitorKind) {
        if self.monitor_kinds.register(kind.name, kind).is_some() {
            warn!(kind = kind.name, "monitor kind re-registered");
        }
    }

    pub fn constraint_kinds(&self) -> &Registry<ConstraintKind> {
        &self.constraint_kinds
    }

    pub fn monitor_kinds(&self) -> &Registry<MonitorKind> {
        &self.monitor_kinds
    }

    /// Compile `request` against `model` at joint state `state`.
    ///
    /// # Errors
    ///
    /// - [`MotumError::UnknownConstraintKind`] / [`MotumError::UnknownMonitorKind`]
    ///   with suggestions or the full listing.
    /// - [`MotumError::ConstraintInitializationFailed`] for bad parameters.
    /// - [`MotumError::InvalidGoal`] for unresolvable frames, monitor names,
    ///   or monitor cycles.
    pub fn compile(
        &self,
        request: &MotionRequest,
        model: &dyn KinematicModel,
        state: &JointState,
        config: &ControllerConfig,
    ) -> Result<CompiledGoal, MotumError> {
        let (monitors, monitor_summaries) = self.compile_monitors(request)?;

        let mut ctx = BuildContext {
            model,
            state,
            control_horizon: config.control_horizon(),
            sample_period: config.sample_period,
        };
        let mut tasks = Vec::new();
        let mut constraints = BTreeMap::new();
        let mut debug_expressions = BTreeMap::new();

        for spec in &request.constraints {
            let kind = self
                .constraint_kinds
                .resolve(&spec.kind)
                .map_err(|hint| MotumError::UnknownConstraintKind {
                    kind: spec.kind.clone(),
                    hint,
                })?;
            let goal_name = spec.name.clone().unwrap_or_else(|| spec.kind.clone());
            let refs = MonitorRefs {
                start: resolve_monitors(&monitors, &goal_name, "start", &spec.start_monitors)?,
                hold: resolve_monitors(&monitors, &goal_name, "hold", &spec.hold_monitors)?,
                end: resolve_monitors(&monitors, &goal_name, "end", &spec.end_monitors)?,
            };

            for goal_task in (kind.build)(&mut ctx, &spec.parameters)? {
                let mut names = Vec::with_capacity(goal_task.constraints.len());
                for constraint in goal_task.constraints {
                    let constraint = constraint.qualified(&goal_name, &goal_task.name);
                    names.push(constraint.name.clone());
                    if let Some(previous) = constraints.insert(constraint.name.clone(), constraint) {
                        debug!(constraint = %previous.name, "constraint name reused; keeping the later one");
                    }
                }
                for (local, expression) in goal_task.debug {
                    debug_expressions.insert(format!("{goal_name}/{}/{local}", goal_task.name), expression);
                }
                tasks.push(Task {
                    name: format!("{goal_name}/{}", goal_task.name),
                    goal: goal_name.clone(),
                    constraints: names,
                    monitors: refs.clone(),
                    start_monitors: spec.start_monitors.clone(),
                    hold_monitors: spec.hold_monitors.clone(),
                    end_monitors: spec.end_monitors.clone(),
                });
            }
        }

        let free_variables = if request.check_reachability {
            BTreeMap::new()
        } else {
            model
                .controlled_joints()
                .iter()
                .map(|joint| {
                    (
                        joint.name.clone(),
                        FreeVariableBounds {
                            joint: joint.name.clone(),
                            lower_position: joint.limits.lower_position,
                            upper_position: joint.limits.upper_position,
                            velocity: joint.limits.velocity,
                            acceleration: joint.limits.acceleration,
                            jerk: joint.limits.jerk,
                        },
                    )
                })
                .collect()
        };

        info!(
            tasks = tasks.len(),
            constraints = constraints.len(),
            monitors = monitors.len(),
            free_variables = free_variables.len(),
            "motion request compiled"
        );
        Ok(CompiledGoal {
            tasks,
            constraints,
            debug_expressions,
            free_variables,
            monitors,
            monitor_summaries,
            collisions: request.collisions.clone(),
        })
    }

    fn compile_monitors(&self, request: &MotionRequest) -> Result<(MonitorEvaluator, Vec<MonitorSummary>), MotumError> {
        let mut index = BTreeMap::new();
        for (i, spec) in request.monitors.iter().enumerate() {
            if index.insert(spec.name.as_str(), i).is_some() {
                return Err(MotumError::InvalidGoal(format!("duplicate monitor name \"{}\"", spec.name)));
            }
        }

        let mut monitors = Vec::with_capacity(request.monitors.len());
        let mut summaries = Vec::with_capacity(request.monitors.len());
        for spec in &request.monitors {
            let kind = self
                .monitor_kinds
                .resolve(&spec.kind)
                .map_err(|hint| MotumError::UnknownMonitorKind {
                    kind: spec.kind.clone(),
                    hint,
                })?;
            let start = spec
                .start_monitors
                .iter()
                .map(|name| {
                    index.get(name.as_str()).copied().ok_or_else(|| {
                        MotumError::InvalidGoal(format!(
                            "monitor \"{}\" starts on undeclared monitor \"{name}\"",
                            spec.name
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            monitors.push((kind.build)(&spec.name, &spec.parameters)?.with_start_monitors(start));
            summaries.push(MonitorSummary {
                name: spec.name.clone(),
                kind: spec.kind.clone(),
                start_monitors: spec.start_monitors.clone(),
            });
        }
        Ok((MonitorEvaluator::new(monitors)?, summaries))
    }
}

fn resolve_monitors(
    monitors: &MonitorEvaluator,
    goal: &str,
    role: &str,
    names: &[String],
) -> Result<Vec<usize>, MotumError> {
    names
        .iter()
        .map(|name| {
            monitors.index_of(name).ok_or_else(|| {
                MotumError::InvalidGoal(format!("goal \"{goal}\" {role} monitor \"{name}\" is not declared"))
            })
        })
        .collect()
}
