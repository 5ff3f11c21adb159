//! Constraint-kind factories and what they produce.
//!
//! A constraint kind is a typed parameter struct implementing
//! [`ConstraintFactory`].  [`ConstraintKind::of`] erases it into a registry
//! entry holding plain function pointers: one to parse-and-build, one to
//! render the kind's usage text.

use std::collections::BTreeMap;

use motum_hal::KinematicModel;
use motum_types::{Constraint, Expression, JointState, MotumError};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::params::{self, ParamError};

/// Shared state handed to every factory while a request compiles.
pub struct BuildContext<'a> {
    pub model: &'a dyn KinematicModel,
    /// Joint state at compile time, used to resolve frames.
    pub state: &'a JointState,
    pub control_horizon: usize,
    pub sample_period: f64,
}

/// One task produced by a goal: a local name plus its constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalTask {
    pub name: String,
    pub constraints: Vec<Constraint>,
    /// Expressions worth plotting, keyed by local name.
    pub debug: BTreeMap<String, Expression>,
}

impl GoalTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
            debug: BTreeMap::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_debug(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.debug.insert(name.into(), expression);
        self
    }
}

pub trait ConstraintFactory: DeserializeOwned + JsonSchema {
    const KIND: &'static str;

    fn build(self, ctx: &mut BuildContext<'_>) -> Result<Vec<GoalTask>, MotumError>;
}

/// Registry entry for one constraint kind.
#[derive(Clone, Copy)]
pub struct ConstraintKind {
    pub name: &'static str,
    pub usage: fn() -> String,
    pub build: fn(&mut BuildContext<'_>, &Value) -> Result<Vec<GoalTask>, MotumError>,
}

impl ConstraintKind {
    pub fn of<T: ConstraintFactory>() -> Self {
        Self {
            name: T::KIND,
            usage: params::usage_of::<T>,
            build: build_erased::<T>,
        }
    }
}

fn build_erased<T: ConstraintFactory>(ctx: &mut BuildContext<'_>, raw: &Value) -> Result<Vec<GoalTask>, MotumError> {
    let parameters: T = params::parse(raw).map_err(init_failure::<T>)?;
    parameters.build(ctx)
}

/// [`MotumError::ConstraintInitializationFailed`] for kind `T`, with usage.
pub fn init_failure<T: ConstraintFactory>(cause: impl Into<ParamError>) -> MotumError {
    MotumError::ConstraintInitializationFailed {
        kind: T::KIND.to_string(),
        cause: cause.into().to_string(),
        usage: Some(params::usage_of::<T>()),
    }
}
