//! [`ControlLoop`] – the per-tick pipeline of one motion episode.
//!
//! Each call to [`ControlLoop::tick`] first checks the fault slot and the
//! cancellation token, then ticks one sequence:
//!
//! 1. **Sync** – selector over: take a fresh joint-state sample, reuse the
//!    last one, or (before any sample has arrived) wait for the first one
//!    with a bounded timeout.  A timeout is `Continue`, not a failure,
//!    unless the configured budget of consecutive timeouts is used up.
//! 2. **Compile** – on the first tick only, compile the motion request.
//!    Any compile error lands in the fault slot and ends the episode before
//!    a solver input is ever built.
//! 3. **Monitors** – evaluate this tick's monitor values.
//! 4. **Tasks** – derive each task's state from the monitor values and
//!    commit both as this tick's history row, so a tick that fails later
//!    still leaves a complete row behind.
//! 5. **Merge** – active tasks' constraints plus freshly synthesized
//!    collision constraints (one proximity query per tick).
//! 6. **Solve** / 7. **Apply** – hand the merged set to the solver and send
//!    the first command to the robot.
//! 8. **Record** – close the tick.
//! 9. **Terminate?** – `Succeed`, `Fail`, or `Continue` to the next tick.
//!
//! [`ControlLoop::run`] repeats this until a terminal result, stops the
//! robot, and returns the [`EpisodeReport`].  With `realtime` set in the
//! controller config, consecutive ticks are held one `sample_period` of wall
//! clock apart; the terminal tick is not padded, so the stop goes out at once.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use motum_goals::{CollisionPolicy, CollisionSynthesizer};
use motum_hal::SolverInput;
use motum_kernel::{MonitorContext, TaskStatus, task_status};
use motum_types::{
    EpisodeOutcome, EpisodeReport, EpisodeStatus, JointSample, MotumError, TaskState, TaskSummary,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn};

use crate::behavior_tree::{BehaviorNode, TickResult};
use crate::episode::{CancelToken, EpisodeContext, JOINT_STATE_FEED};
use crate::pacer::TickPacer;

/// Status messages buffered for slow subscribers.
const STATUS_CHANNEL_CAPACITY: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Tree
// ─────────────────────────────────────────────────────────────────────────────

fn step(
    name: &str,
    action: fn(&mut EpisodeContext) -> Result<(), MotumError>,
) -> BehaviorNode<EpisodeContext> {
    BehaviorNode::leaf(name, move |ctx: &mut EpisodeContext| action(ctx).into())
}

/// The tree ticked once per control cycle.
pub fn control_tree() -> BehaviorNode<EpisodeContext> {
    BehaviorNode::sequence(
        "control tick",
        vec![
            BehaviorNode::selector(
                "sync sensor state",
                vec![
                    BehaviorNode::leaf("fresh sample", fresh_sample),
                    BehaviorNode::leaf("reuse last sample", reuse_sample),
                    BehaviorNode::leaf("wait for first sample", wait_for_first_sample),
                ],
            ),
            step("compile goal", compile_goal),
            step("evaluate monitors", evaluate_monitors),
            step("derive task states", derive_task_states),
            step("merge constraints", merge_constraints),
            step("solve", solve),
            step("apply commands", apply_commands),
            step("record history", record_history),
            BehaviorNode::leaf("check termination", check_termination),
        ],
    )
}

// ── Sync ────────────────────────────────────────────────────────────────────

fn not_available() -> TickResult {
    TickResult::Fail(MotumError::Timeout { waited_ms: 0 })
}

fn absorb(ctx: &mut EpisodeContext, sample: &JointSample) {
    ctx.state.absorb(sample);
    ctx.has_sample = true;
    ctx.consecutive_timeouts = 0;
    ctx.watchdog.fed(JOINT_STATE_FEED);
}

fn fresh_sample(ctx: &mut EpisodeContext) -> TickResult {
    match ctx.feed.try_take() {
        Some(sample) => {
            absorb(ctx, &sample);
            TickResult::Succeed
        }
        None => not_available(),
    }
}

fn reuse_sample(ctx: &mut EpisodeContext) -> TickResult {
    if !ctx.has_sample {
        return not_available();
    }
    if ctx.watchdog.missed(JOINT_STATE_FEED) {
        warn!(feed = JOINT_STATE_FEED, tick = ctx.tick, "feed stale; reusing last joint state");
    }
    TickResult::Succeed
}

fn wait_for_first_sample(ctx: &mut EpisodeContext) -> TickResult {
    let waited_ms = ctx.config.first_sample_timeout_ms;
    if let Some(sample) = ctx.feed.take_timeout(Duration::from_millis(waited_ms)) {
        absorb(ctx, &sample);
        return TickResult::Succeed;
    }
    ctx.sensor_timeouts += 1;
    ctx.consecutive_timeouts += 1;
    warn!(
        timeouts = ctx.sensor_timeouts,
        consecutive = ctx.consecutive_timeouts,
        waited_ms,
        "no joint state received"
    );
    match ctx.config.sensor_timeout_budget {
        Some(budget) if ctx.consecutive_timeouts >= budget => TickResult::Fail(MotumError::Timeout {
            waited_ms: waited_ms * u64::from(ctx.consecutive_timeouts),
        }),
        _ => TickResult::Continue,
    }
}

// ── Compile ─────────────────────────────────────────────────────────────────

fn compile_goal(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    if ctx.goal.is_some() {
        return Ok(());
    }
    let goal = ctx
        .compiler
        .compile(&ctx.request, ctx.model.as_ref(), &ctx.state, &ctx.config)
        .inspect_err(|e| error!(code = e.code(), error = %e, "motion request rejected"))?;
    let policy = CollisionPolicy::resolve(&goal.collisions);
    debug!(
        external = policy.external,
        self_collision = policy.self_collision,
        soft_override = ?policy.soft_override,
        "collision policy resolved"
    );
    ctx.collisions = Some(CollisionSynthesizer::new(
        policy,
        ctx.config.collision_avoidance.clone(),
        ctx.model.as_ref(),
    ));
    ctx.goal = Some(goal);
    Ok(())
}

// ── Monitors and tasks ──────────────────────────────────────────────────────

fn evaluate_monitors(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    ctx.time = ctx.tick as f64 * ctx.config.sample_period;
    let goal = ctx
        .goal
        .as_mut()
        .ok_or_else(|| MotumError::InvalidGoal("goal not compiled yet".into()))?;
    let monitor_ctx = MonitorContext {
        model: ctx.model.as_ref(),
        state: &ctx.state,
        time: ctx.time,
    };
    ctx.monitor_snapshot = Some(goal.monitors.evaluate(&monitor_ctx)?);
    Ok(())
}

fn derive_task_states(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    let snapshot = ctx
        .monitor_snapshot
        .take()
        .ok_or_else(|| MotumError::InvalidGoal("monitors not evaluated this tick".into()))?;
    let goal = ctx
        .goal
        .as_mut()
        .ok_or_else(|| MotumError::InvalidGoal("goal not compiled yet".into()))?;
    let status: Vec<TaskStatus> = goal
        .tasks
        .iter()
        .map(|task| task_status(&task.monitors, &snapshot.values))
        .collect();
    let states = status.iter().map(|s| s.state).collect();
    goal.monitors.commit(ctx.tick, ctx.time, snapshot, states);
    ctx.task_status = status;
    Ok(())
}

// ── Constraints, solve, apply ───────────────────────────────────────────────

fn merge_constraints(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    let goal = ctx
        .goal
        .as_ref()
        .ok_or_else(|| MotumError::InvalidGoal("goal not compiled yet".into()))?;
    let mut merged = BTreeMap::new();
    for (task, status) in goal.tasks.iter().zip(&ctx.task_status) {
        if !status.is_active() {
            continue;
        }
        for name in &task.constraints {
            if let Some(constraint) = goal.constraints.get(name) {
                merged.insert(name.clone(), constraint.clone());
            }
        }
    }

    if let Some(synthesizer) = ctx.collisions.as_mut()
        && synthesizer.is_enabled()
    {
        let proximity = ctx.proximity.query(&ctx.state, synthesizer.query_distance())?;
        let generated = synthesizer.synthesize(
            &proximity,
            ctx.model.as_ref(),
            ctx.config.sample_period,
            ctx.config.control_horizon(),
        )?;
        for constraint in generated.into_constraints() {
            merged.insert(constraint.name.clone(), constraint);
        }
    }

    ctx.solver_constraints = merged;
    Ok(())
}

fn solve(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    let goal = ctx
        .goal
        .as_ref()
        .ok_or_else(|| MotumError::InvalidGoal("goal not compiled yet".into()))?;
    let input = SolverInput {
        constraints: &ctx.solver_constraints,
        free_variables: &goal.free_variables,
        control_horizon: ctx.config.control_horizon(),
        sample_period: ctx.config.sample_period,
        state: &ctx.state,
    };
    let output = ctx.solver.solve(&input, ctx.model.as_ref())?;
    ctx.command = output.next_command();
    Ok(())
}

fn apply_commands(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    ctx.robot.send_velocities(&ctx.command)?;
    if ctx.time >= ctx.config.minimum_episode_time {
        ctx.convergence.record_command(&ctx.command);
    }
    Ok(())
}

// ── Record and terminate ────────────────────────────────────────────────────

fn record_history(ctx: &mut EpisodeContext) -> Result<(), MotumError> {
    debug!(
        tick = ctx.tick,
        time = ctx.time,
        constraints = ctx.solver_constraints.len(),
        "tick recorded"
    );
    ctx.tick += 1;
    Ok(())
}

fn check_termination(ctx: &mut EpisodeContext) -> TickResult {
    let Some(goal) = ctx.goal.as_ref() else {
        return TickResult::Fail(MotumError::InvalidGoal("goal not compiled yet".into()));
    };
    if ctx.time > ctx.config.max_trajectory_length {
        return TickResult::Fail(MotumError::TrajectoryTooLong {
            limit_s: ctx.config.max_trajectory_length,
        });
    }
    if goal.monitors.motion_ended() {
        debug!(tick = ctx.tick, "end-motion monitor fired");
        return TickResult::Succeed;
    }
    let settled = !goal.monitors.has_end_motion()
        && ctx.task_status.iter().all(|s| s.state == TaskState::Succeeded)
        && ctx.time >= ctx.config.minimum_episode_time
        && ctx.convergence.is_converged();
    if settled {
        debug!(tick = ctx.tick, "all tasks succeeded and motion settled");
        return TickResult::Succeed;
    }
    TickResult::Continue
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct ControlLoop {
    tree: BehaviorNode<EpisodeContext>,
    ctx: EpisodeContext,
    status: broadcast::Sender<EpisodeStatus>,
}

impl ControlLoop {
    pub fn new(ctx: EpisodeContext) -> Self {
        let (status, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            tree: control_tree(),
            ctx,
            status,
        }
    }

    pub fn context(&self) -> &EpisodeContext {
        &self.ctx
    }

    /// `Running` after every non-terminal tick, `Finished` once.
    pub fn subscribe(&self) -> broadcast::Receiver<EpisodeStatus> {
        self.status.subscribe()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.ctx.cancel.clone()
    }

    /// Run one tick.  A faulted or cancelled episode fails without ticking.
    pub fn tick(&mut self) -> TickResult {
        if let Some(fault) = &self.ctx.fault {
            return TickResult::Fail(fault.clone());
        }
        if self.ctx.cancel.is_cancelled() {
            return TickResult::Fail(self.ctx.raise(MotumError::Cancelled("cancellation requested".into())));
        }
        let result = self.tree.tick(&mut self.ctx);
        match &result {
            TickResult::Fail(e) => {
                self.ctx.raise(e.clone());
            }
            TickResult::Continue => {
                // No subscriber is fine.
                let _ = self.status.send(EpisodeStatus::Running {
                    tick: self.ctx.tick,
                    time: self.ctx.time,
                });
            }
            TickResult::Succeed => {}
        }
        result
    }

    /// Tick until the episode ends, then stop the robot and report.
    pub fn run(mut self) -> EpisodeReport {
        let span = info_span!("episode", id = %self.ctx.id, robot = self.ctx.robot.id());
        let _entered = span.enter();
        info!(
            constraints = self.ctx.request.constraints.len(),
            monitors = self.ctx.request.monitors.len(),
            "episode started"
        );
        let mut pacer = self.pacer();
        let outcome = loop {
            match self.tick() {
                TickResult::Continue => {
                    if let Some(pacer) = pacer.as_mut() {
                        pacer.wait();
                    }
                }
                TickResult::Succeed => break EpisodeOutcome::Success,
                TickResult::Fail(e) => break EpisodeOutcome::Failure(e),
            }
        };
        self.finish(outcome)
    }

    /// Only in real-time mode; the simulator ticks as fast as it can.
    fn pacer(&self) -> Option<TickPacer> {
        if !self.ctx.config.realtime {
            return None;
        }
        let pacer = TickPacer::from_secs_f64(self.ctx.config.sample_period);
        if pacer.is_none() {
            warn!(sample_period = self.ctx.config.sample_period, "unusable sample period; ticks are not paced");
        }
        pacer
    }

    /// [`run`](ControlLoop::run) on Tokio's blocking pool.
    pub fn spawn(self) -> tokio::task::JoinHandle<EpisodeReport> {
        tokio::task::spawn_blocking(move || self.run())
    }

    fn finish(mut self, outcome: EpisodeOutcome) -> EpisodeReport {
        if let Err(e) = self.ctx.robot.stop() {
            warn!(error = %e, "stop command failed");
        }

        let failed = !outcome.is_success();
        let (tasks, monitors, history) = match self.ctx.goal.take() {
            Some(goal) => {
                let tasks = goal
                    .tasks
                    .iter()
                    .enumerate()
                    .map(|(i, task)| {
                        let state = self
                            .ctx
                            .task_status
                            .get(i)
                            .map_or(TaskState::Pending, |s| s.state);
                        TaskSummary {
                            name: task.name.clone(),
                            constraints: task.constraints.clone(),
                            start_monitors: task.start_monitors.clone(),
                            hold_monitors: task.hold_monitors.clone(),
                            end_monitors: task.end_monitors.clone(),
                            final_state: if failed && state != TaskState::Succeeded {
                                TaskState::Failed
                            } else {
                                state
                            },
                        }
                    })
                    .collect();
                (tasks, goal.monitor_summaries, goal.monitors.history().to_vec())
            }
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let ticks_executed = history.len() as u64;
        match &outcome {
            EpisodeOutcome::Success => info!(ticks = ticks_executed, time = self.ctx.time, "episode succeeded"),
            EpisodeOutcome::Failure(e) => warn!(
                ticks = ticks_executed,
                code = e.code(),
                error = %e,
                "episode failed"
            ),
        }
        let _ = self.status.send(EpisodeStatus::Finished(outcome.clone()));

        EpisodeReport {
            id: self.ctx.id,
            started_at: self.ctx.started_at,
            finished_at: Utc::now(),
            outcome,
            ticks_executed,
            sensor_timeouts: self.ctx.sensor_timeouts,
            monitors,
            tasks,
            history,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
