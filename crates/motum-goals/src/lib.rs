//! `motum-goals` – from motion request to solver constraints.
//!
//! # Modules
//!
//! | Module | Contents |
//! |---|---|
//! | [`compiler`] | [`GoalCompiler`]: registries of kinds, request → [`CompiledGoal`] |
//! | [`constraints`] | Built-in constraint kinds |
//! | [`monitors`] | Monitor-kind registry entries for the kernel's monitor kinds |
//! | [`goal`] | [`ConstraintFactory`], [`ConstraintKind`], [`GoalTask`] |
//! | [`params`] | Schema-checked parameter parsing with field-path errors |
//! | [`registry`] | Name → factory table with close-match suggestions |
//! | [`collision`] | [`CollisionPolicy`] and per-tick [`CollisionSynthesizer`] |

pub mod collision;
pub mod compiler;
pub mod constraints;
pub mod goal;
pub mod monitors;
pub mod params;
pub mod registry;

pub use collision::{CollisionConstraints, CollisionPolicy, CollisionSynthesizer};
pub use compiler::{CompiledGoal, GoalCompiler, Task};
pub use goal::{BuildContext, ConstraintFactory, ConstraintKind, GoalTask};
pub use monitors::{MonitorFactory, MonitorKind};
pub use params::ParamError;
pub use registry::Registry;
