//! `motum-hal` – seams to the world outside the controller.
//!
//! The controller core never talks to a solver library, a collision engine,
//! or a robot driver directly.  It talks to the traits in this crate, and
//! [`sim`] provides in-process implementations of all of them.
//!
//! # Modules
//!
//! - [`model`] – [`KinematicModel`], [`ProximityService`], and expression
//!   evaluation against a model.
//! - [`solver`] – [`Solver`] with its [`SolverInput`] / [`SolverOutput`].
//! - [`robot`] – [`RobotInterface`] for applying velocity commands.
//! - [`feedback`] – [`JointStateSlot`], the single-slot joint-state feed.
//! - [`frames`] – quaternions, rigid transforms, and a static [`FrameTree`].
//! - [`sim`] – simulated world, proximity service, and robot.
//! - [`sim_solver`] – damped least-squares reference solver.

pub mod feedback;
pub mod frames;
pub mod model;
pub mod robot;
pub mod sim;
pub mod sim_solver;
pub mod solver;

pub use feedback::JointStateSlot;
pub use frames::{FrameTree, Quaternion, Transform3D};
pub use model::{ControlledJoint, KinematicModel, ProximityService, evaluate, partial_derivative};
pub use robot::RobotInterface;
pub use sim::{SimProbe, SimProximity, SimRobot, SimRobotDescription, SimWorld};
pub use sim_solver::DampedLeastSquares;
pub use solver::{Solver, SolverInput, SolverOutput};
