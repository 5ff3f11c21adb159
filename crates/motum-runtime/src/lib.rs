//! `motum-runtime` – the control tick scheduler.
//!
//! Runs one motion episode as a sequence of fixed-period ticks against the
//! seams of `motum-hal`, until the goal is reached, a monitor aborts it, or
//! it is cancelled.
//!
//! # Modules
//!
//! - [`behavior_tree`] – [`TickResult`] and [`BehaviorNode`]: sequence and
//!   selector composites over a shared context, plus the plain
//!   [`sequence`][behavior_tree::sequence] / [`selector`][behavior_tree::selector]
//!   combinators.
//! - [`episode`] – [`EpisodeContext`]: everything one episode owns, the
//!   [`Collaborators`] it talks to, and the [`CancelToken`].
//! - [`control_loop`] – [`ControlLoop`]: the per-tick pipeline, the fault
//!   slot, the status stream, and the final [`EpisodeReport`][motum_types::EpisodeReport].
//! - [`convergence`] – [`ConvergenceWindow`]: implicit-success detection.
//! - [`pacer`] – [`TickPacer`]: wall-clock pacing for real-time robots.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing] /
//!   [`TelemetrySettings`]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod behavior_tree;
pub mod control_loop;
pub mod convergence;
pub mod episode;
pub mod pacer;
pub mod telemetry;

pub use behavior_tree::{BehaviorNode, TickResult};
pub use control_loop::{ControlLoop, control_tree};
pub use convergence::ConvergenceWindow;
pub use episode::{CancelToken, Collaborators, EpisodeContext};
pub use pacer::TickPacer;
pub use telemetry::{LogFormat, TelemetrySettings, TracerProviderGuard, init_tracing, init_with};
