//! `motum-types` – shared data model for the motum whole-body controller.
//!
//! Every other crate in the workspace speaks in these types: the motion
//! request that starts an episode, the symbolic constraints handed to the
//! solver, the joint/proximity snapshots read from the world, the per-tick
//! history, and the single [`MotumError`] taxonomy.
//!
//! # Modules
//!
//! | Module | Contents |
//! |---|---|
//! | [`geometry`] | [`Vector3`], [`PointStamped`], [`Vector3Stamped`] |
//! | [`request`] | [`MotionRequest`], [`ConstraintSpec`], [`MonitorSpec`], [`CollisionEntry`] |
//! | [`constraint`] | [`Constraint`], [`Expression`], [`Bounds`], [`WeightClass`], weight constants |
//! | [`world`] | [`JointState`], [`JointSample`], [`JointLimits`], [`ProximityResult`] |
//! | [`history`] | [`TaskState`], [`MonitorPhase`], [`TickHistoryEntry`], [`EpisodeReport`] |
//! | [`config`] | [`ControllerConfig`], [`CollisionAvoidanceConfig`] |
//! | [`error`] | [`MotumError`], [`KindHint`] |

pub mod config;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod history;
pub mod request;
pub mod world;

pub use config::{
    CollisionAvoidanceConfig, ControllerConfig, ExternalThresholds, PairThresholds, Thresholds,
};
pub use constraint::{
    Axis, Bounds, Constraint, Expression, WEIGHT_ABOVE_CA, WEIGHT_BELOW_CA,
    WEIGHT_COLLISION_AVOIDANCE, WEIGHT_MAX, WEIGHT_MIN, WeightClass,
};
pub use error::{KindHint, MotumError};
pub use geometry::{PointStamped, Vector3, Vector3Stamped};
pub use history::{
    EpisodeOutcome, EpisodeReport, EpisodeStatus, MonitorPhase, MonitorSummary, TaskState,
    TaskSummary, TickHistoryEntry,
};
pub use request::{CollisionDirective, CollisionEntry, ConstraintSpec, MonitorSpec, MotionRequest};
pub use world::{
    Contact, ContactKey, FreeVariableBounds, JointLimits, JointSample, JointState,
    ProximityResult,
};
