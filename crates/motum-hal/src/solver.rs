//! Solver seam.
//!
//! The numeric method is external.  The controller hands it an ordered
//! constraint set and per-joint bounds and receives velocity commands for
//! the next `control_horizon` ticks.

use std::collections::BTreeMap;

use motum_types::{Constraint, FreeVariableBounds, JointState, MotumError};

use crate::model::KinematicModel;

/// Everything the solver sees for one tick.
#[derive(Debug, Clone, Copy)]
pub struct SolverInput<'a> {
    /// Keyed by fully-qualified constraint name; iteration order is stable.
    pub constraints: &'a BTreeMap<String, Constraint>,
    /// Empty when the episode only checks reachability.
    pub free_variables: &'a BTreeMap<String, FreeVariableBounds>,
    pub control_horizon: usize,
    pub sample_period: f64,
    pub state: &'a JointState,
}

/// Joint velocity commands, one map per future tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOutput {
    pub commands: Vec<BTreeMap<String, f64>>,
}

impl SolverOutput {
    /// Commands for the tick about to be applied.
    pub fn next_command(&self) -> BTreeMap<String, f64> {
        self.commands.first().cloned().unwrap_or_default()
    }
}

pub trait Solver: Send {
    /// # Errors
    ///
    /// [`MotumError::InfeasibleSolve`] when no command satisfies the input.
    fn solve(
        &mut self,
        input: &SolverInput<'_>,
        model: &dyn KinematicModel,
    ) -> Result<SolverOutput, MotumError>;
}
