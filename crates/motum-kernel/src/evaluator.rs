//! [`MonitorEvaluator`] – evaluates the monitor set once per tick.
//!
//! Monitors are evaluated in a topological order of their start-monitor
//! dependencies, but gating always reads the *previous* tick's values: a
//! monitor whose start monitors become true on tick `t` is first evaluated on
//! tick `t + 1`.
//!
//! Evaluation is split in two so a scheduler can stage results:
//!
//! 1. [`MonitorEvaluator::evaluate`] computes a [`MonitorSnapshot`] without
//!    touching the previous-tick vector.  Calling it twice with the same
//!    context yields the same snapshot.
//! 2. [`MonitorEvaluator::commit`] appends the snapshot, together with the
//!    task states derived from it, to the history and makes it the
//!    previous-tick vector.  A row is never written without its task states.

use motum_types::{MonitorPhase, MotumError, TaskState, TickHistoryEntry};
use tracing::debug;

use crate::monitor::{Monitor, MonitorContext};

/// Monitor values and phases produced by one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    pub values: Vec<bool>,
    pub phases: Vec<MonitorPhase>,
}

pub struct MonitorEvaluator {
    monitors: Vec<Monitor>,
    order: Vec<usize>,
    previous: Vec<bool>,
    history: Vec<TickHistoryEntry>,
}

impl std::fmt::Debug for MonitorEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEvaluator")
            .field("order", &self.order)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

impl MonitorEvaluator {
    /// Validate the dependency graph and fix an evaluation order.
    ///
    /// # Errors
    ///
    /// [`MotumError::InvalidGoal`] for duplicate names, out-of-range or
    /// self-referencing start monitors, and dependency cycles.
    pub fn new(monitors: Vec<Monitor>) -> Result<Self, MotumError> {
        let n = monitors.len();
        for (i, monitor) in monitors.iter().enumerate() {
            if monitors[..i].iter().any(|m| m.name() == monitor.name()) {
                return Err(MotumError::InvalidGoal(format!(
                    "duplicate monitor name \"{}\"",
                    monitor.name()
                )));
            }
            for &dep in monitor.start_monitors() {
                if dep >= n {
                    return Err(MotumError::InvalidGoal(format!(
                        "monitor \"{}\" references start monitor #{dep} of {n}",
                        monitor.name()
                    )));
                }
            }
        }

        let order = topological_order(&monitors)?;
        debug!(monitors = n, "monitor evaluation order fixed");
        Ok(Self {
            monitors,
            order,
            previous: vec![false; n],
            history: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    /// Index of the monitor called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.monitors.iter().position(|m| m.name() == name)
    }

    /// Evaluation order (indices into [`Self::monitors`]).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Values committed on the previous tick; all `false` before the first.
    pub fn previous(&self) -> &[bool] {
        &self.previous
    }

    pub fn history(&self) -> &[TickHistoryEntry] {
        &self.history
    }

    /// Evaluate every monitor for this tick.
    ///
    /// Monitors whose start monitors were not all true on the previous tick
    /// are inactive and carry their previous value.
    pub fn evaluate(&mut self, ctx: &MonitorContext<'_>) -> Result<MonitorSnapshot, MotumError> {
        let n = self.monitors.len();
        let mut values = self.previous.clone();
        let mut phases = vec![MonitorPhase::Inactive; n];

        for &i in &self.order {
            let previous = self.previous[i];
            let monitor = &mut self.monitors[i];
            let active = monitor.start_monitors().iter().all(|&dep| self.previous[dep]);
            if !active {
                phases[i] = if previous {
                    MonitorPhase::Satisfied
                } else {
                    MonitorPhase::Inactive
                };
                continue;
            }
            let value = monitor.evaluate(previous, ctx)?;
            values[i] = value;
            phases[i] = if value {
                MonitorPhase::Satisfied
            } else {
                MonitorPhase::Running
            };
        }

        Ok(MonitorSnapshot { values, phases })
    }

    /// Record `snapshot` and the task states derived from it as tick `tick`,
    /// and make it the previous-tick vector.
    pub fn commit(
        &mut self,
        tick: u64,
        time: f64,
        snapshot: MonitorSnapshot,
        tasks: Vec<TaskState>,
    ) -> &TickHistoryEntry {
        self.previous.clone_from(&snapshot.values);
        self.history.push(TickHistoryEntry {
            tick,
            time,
            monitors: snapshot.values,
            monitor_phases: snapshot.phases,
            tasks,
        });
        let last = self.history.len() - 1;
        &self.history[last]
    }

    /// [`Self::evaluate`] followed by [`Self::commit`], for a monitor set
    /// that gates no tasks.
    pub fn tick(&mut self, tick: u64, ctx: &MonitorContext<'_>) -> Result<Vec<bool>, MotumError> {
        let snapshot = self.evaluate(ctx)?;
        Ok(self.commit(tick, ctx.time, snapshot, Vec::new()).monitors.clone())
    }

    /// `true` when a monitor that ends the motion is currently true.
    pub fn motion_ended(&self) -> bool {
        self.monitors
            .iter()
            .zip(&self.previous)
            .any(|(m, &value)| value && m.ends_motion())
    }

    /// Whether any monitor ends the motion at all.
    pub fn has_end_motion(&self) -> bool {
        self.monitors.iter().any(Monitor::ends_motion)
    }
}

/// Kahn's algorithm, always releasing the lowest ready index first.
fn topological_order(monitors: &[Monitor]) -> Result<Vec<usize>, MotumError> {
    let n = monitors.len();
    let mut indegree = vec![0usize; n];
    let mut dependents = vec![Vec::new(); n];
    for (i, monitor) in monitors.iter().enumerate() {
        for &dep in monitor.start_monitors() {
            indegree[i] += 1;
            dependents[dep].push(i);
        }
    }

    let mut ready: std::collections::BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < n {
        let stuck: Vec<&str> = (0..n)
            .filter(|&i| indegree[i] > 0)
            .map(|i| monitors[i].name())
            .collect();
        return Err(MotumError::InvalidGoal(format!(
            "start monitors form a cycle through: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ConditionMonitor, PayloadMonitor};
    use crate::monitor_kinds::{Sleep, TimeAbove};
    use motum_hal::{SimRobotDescription, SimWorld};
    use motum_types::JointState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn world() -> SimWorld {
        SimWorld::new(SimRobotDescription::planar_arm()).unwrap()
    }

    fn time_above(name: &str, threshold: f64) -> Monitor {
        Monitor::condition(name, Box::new(TimeAbove { threshold }), false)
    }

    /// True for `from <= time < until`; counts evaluations.
    struct Flag {
        from: f64,
        until: f64,
        calls: Arc<AtomicUsize>,
    }

    impl ConditionMonitor for Flag {
        fn kind(&self) -> &'static str {
            "Flag"
        }

        fn evaluate(&self, ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ctx.time >= self.from && ctx.time < self.until)
        }
    }

    struct Never;

    impl PayloadMonitor for Never {
        fn kind(&self) -> &'static str {
            "Never"
        }

        fn run(&mut self, _ctx: &MonitorContext<'_>) -> Result<bool, MotumError> {
            Ok(false)
        }
    }

    #[test]
    fn evaluate_is_idempotent_until_commit() {
        let w = world();
        let s = JointState::default();
        let mut ev = MonitorEvaluator::new(vec![time_above("t", 0.5)]).unwrap();
        let ctx = MonitorContext { model: &w, state: &s, time: 1.0 };
        let a = ev.evaluate(&ctx).unwrap();
        let b = ev.evaluate(&ctx).unwrap();
        assert_eq!(a, b);
        assert_eq!(ev.previous(), &[false]);
        ev.commit(1, 1.0, a, vec![TaskState::Succeeded]);
        assert_eq!(ev.previous(), &[true]);
        assert_eq!(ev.history().len(), 1);
        assert_eq!(ev.history()[0].tasks, vec![TaskState::Succeeded]);
    }

    #[test]
    fn start_monitors_gate_on_previous_tick() {
        let w = world();
        let s = JointState::default();
        let gate = time_above("gate", 0.0);
        let gated = time_above("gated", -1.0).with_start_monitors(vec![0]);
        let mut ev = MonitorEvaluator::new(vec![gate, gated]).unwrap();
        // gate true on tick 1, gated only evaluated from tick 2.
        let v1 = ev.tick(1, &MonitorContext { model: &w, state: &s, time: 0.1 }).unwrap();
        assert_eq!(v1, vec![true, false]);
        assert_eq!(ev.history()[0].monitor_phases[1], MonitorPhase::Inactive);
        let v2 = ev.tick(2, &MonitorContext { model: &w, state: &s, time: 0.2 }).unwrap();
        assert_eq!(v2, vec![true, true]);
    }

    #[test]
    fn inactive_monitor_keeps_previous_value() {
        let w = world();
        let s = JointState::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = time_above("gate", 0.0);
        let pulse = Monitor::condition(
            "pulse",
            Box::new(Flag {
                from: -5.0,
                until: f64::INFINITY,
                calls: calls.clone(),
            }),
            false,
        );
        let mut ev = MonitorEvaluator::new(vec![gate, pulse.with_start_monitors(vec![0])]).unwrap();
        let times = [-10.0, 0.5, 0.6, -1.0, -20.0];
        for (tick, time) in (1..).zip(times) {
            ev.tick(tick, &MonitorContext { model: &w, state: &s, time }).unwrap();
        }
        // Evaluated on ticks 3 and 4 only; on tick 5 the gate was false.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ev.previous(), &[false, true]);
        assert_eq!(ev.history()[0].monitor_phases[1], MonitorPhase::Inactive);
        assert_eq!(ev.history()[4].monitor_phases[1], MonitorPhase::Satisfied);
    }

    #[test]
    fn stay_true_latches_without_reevaluating() {
        let w = world();
        let s = JointState::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let latch = Monitor::condition(
            "latch",
            Box::new(Flag {
                from: 1.0,
                until: 2.0,
                calls: calls.clone(),
            }),
            true,
        );
        let mut ev = MonitorEvaluator::new(vec![latch]).unwrap();
        for (tick, time) in [(1, 0.0), (2, 1.0), (3, 3.0), (4, 4.0)] {
            ev.tick(tick, &MonitorContext { model: &w, state: &s, time }).unwrap();
        }
        assert_eq!(ev.previous(), &[true]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn payload_phase_is_running_while_active() {
        let w = world();
        let s = JointState::default();
        let gate = time_above("gate", 0.0);
        let never = Monitor::payload("never", Box::new(Never)).with_start_monitors(vec![0]);
        let mut ev = MonitorEvaluator::new(vec![gate, never]).unwrap();
        ev.tick(1, &MonitorContext { model: &w, state: &s, time: 1.0 }).unwrap();
        ev.tick(2, &MonitorContext { model: &w, state: &s, time: 1.1 }).unwrap();
        assert_eq!(ev.history()[0].monitor_phases[1], MonitorPhase::Inactive);
        assert_eq!(ev.history()[1].monitor_phases[1], MonitorPhase::Running);
    }

    #[test]
    fn sleep_starts_counting_when_activated() {
        let w = world();
        let s = JointState::default();
        let gate = time_above("gate", 1.0);
        let sleep: Sleep = serde_json::from_value(serde_json::json!({"seconds": 0.45})).unwrap();
        let sleep = Monitor::payload("sleep", Box::new(sleep)).with_start_monitors(vec![0]);
        let mut ev = MonitorEvaluator::new(vec![gate, sleep]).unwrap();
        let mut first_true = None;
        for tick in 1..=40u64 {
            let time = tick as f64 * 0.1;
            let v = ev.tick(tick, &MonitorContext { model: &w, state: &s, time }).unwrap();
            if v[1] && first_true.is_none() {
                first_true = Some(time);
            }
        }
        // gate true at 1.1, sleep active from 1.2, true 0.5 s later.
        assert!((first_true.unwrap() - 1.7).abs() < 1e-9);
    }

    #[test]
    fn cycles_are_rejected_with_names() {
        let a = time_above("a", 0.0).with_start_monitors(vec![1]);
        let b = time_above("b", 0.0).with_start_monitors(vec![0]);
        let c = time_above("c", 0.0);
        let err = MonitorEvaluator::new(vec![a, b, c]).unwrap_err();
        let MotumError::InvalidGoal(msg) = err else {
            panic!("unexpected error");
        };
        assert!(msg.contains("a, b"), "{msg}");
    }

    #[test]
    fn self_reference_and_bad_index_are_rejected() {
        let a = time_above("a", 0.0).with_start_monitors(vec![0]);
        assert!(MonitorEvaluator::new(vec![a]).is_err());
        let b = time_above("b", 0.0).with_start_monitors(vec![7]);
        assert!(MonitorEvaluator::new(vec![b]).is_err());
        assert!(MonitorEvaluator::new(vec![time_above("x", 0.0), time_above("x", 1.0)]).is_err());
    }

    #[test]
    fn order_is_topological_and_stable() {
        let a = time_above("a", 0.0).with_start_monitors(vec![2]);
        let b = time_above("b", 0.0);
        let c = time_above("c", 0.0);
        let ev = MonitorEvaluator::new(vec![a, b, c]).unwrap();
        assert_eq!(ev.order(), &[1, 2, 0]);
    }
}
