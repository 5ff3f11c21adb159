//! `motum-kernel` – Monitors and task lifecycle
//!
//! Decides, tick by tick, what is true about the world and which tasks are
//! in force.  It never talks to the robot or the solver.
//!
//! # Modules
//!
//! - [`monitor`] – [`Monitor`][monitor::Monitor]: a named predicate, either a
//!   stateless [`ConditionMonitor`][monitor::ConditionMonitor] or a stateful
//!   [`PayloadMonitor`][monitor::PayloadMonitor].
//! - [`monitor_kinds`] – the built-in monitor kinds (joint/position goals,
//!   timers, episode terminators).
//! - [`evaluator`] – [`MonitorEvaluator`][evaluator::MonitorEvaluator]:
//!   evaluates monitors in dependency order against the previous tick's
//!   values and keeps the append-only history.
//! - [`lifecycle`] – [`task_status`][lifecycle::task_status]: the pure
//!   start/hold/end → task state function.
//! - [`watchdog`] – [`FeedWatchdog`][watchdog::FeedWatchdog]: flags inbound
//!   feeds that stopped delivering samples.

pub mod evaluator;
pub mod lifecycle;
pub mod monitor;
pub mod monitor_kinds;
pub mod watchdog;

pub use evaluator::{MonitorEvaluator, MonitorSnapshot};
pub use lifecycle::{MonitorRefs, TaskStatus, task_status};
pub use monitor::{ConditionMonitor, Monitor, MonitorBody, MonitorContext, PayloadMonitor};
pub use watchdog::{FeedHealth, FeedWatchdog};
