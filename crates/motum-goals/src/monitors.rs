//! Monitor-kind registry entries.
//!
//! Monitor parameters are parsed the same way as constraint parameters.
//! Condition monitors additionally accept a `stay_true` flag (default
//! `true`), which is stripped before the kind's own schema is applied.

use motum_kernel::Monitor;
use motum_kernel::monitor_kinds::{
    Alternator, CancelMotion, EndMotion, JointGoalReached, LocalMinimumReached, PositionReached, Print,
    SetMaxTrajectoryLength, Sleep, TimeAbove,
};
use motum_types::MotumError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::params::{self, ParamError};

pub trait MonitorFactory: DeserializeOwned + JsonSchema {
    const KIND: &'static str;
    /// Condition monitors accept `stay_true`; payload monitors do not.
    const CONDITION: bool;

    fn into_monitor(self, name: &str, stay_true: bool) -> Monitor;

    /// Cross-field checks the schema cannot express.
    fn validate(&self) -> Result<(), ParamError> {
        Ok(())
    }
}

/// Registry entry for one monitor kind.
#[derive(Clone, Copy)]
pub struct MonitorKind {
    pub name: &'static str,
    pub usage: fn() -> String,
    pub build: fn(&str, &Value) -> Result<Monitor, MotumError>,
}

impl MonitorKind {
    pub fn of<T: MonitorFactory>() -> Self {
        Self {
            name: T::KIND,
            usage: params::usage_of::<T>,
            build: build_erased::<T>,
        }
    }
}

fn monitor_failure<T: MonitorFactory>(name: &str, cause: ParamError) -> MotumError {
    MotumError::ConstraintInitializationFailed {
        kind: T::KIND.to_string(),
        cause: format!("monitor \"{name}\": {cause}"),
        usage: Some(params::usage_of::<T>()),
    }
}

fn build_erased<T: MonitorFactory>(name: &str, raw: &Value) -> Result<Monitor, MotumError> {
    let mut raw = raw.clone();
    let mut stay_true = true;
    if T::CONDITION
        && let Value::Object(map) = &mut raw
        && let Some(flag) = map.remove("stay_true")
    {
        stay_true = flag.as_bool().ok_or_else(|| {
            monitor_failure::<T>(
                name,
                ParamError::WrongType {
                    path: "stay_true".into(),
                    expected: "boolean".into(),
                    found: "non-boolean",
                },
            )
        })?;
    }
    let parameters: T = params::parse(&raw).map_err(|e| monitor_failure::<T>(name, e))?;
    parameters.validate().map_err(|e| monitor_failure::<T>(name, e))?;
    Ok(parameters.into_monitor(name, stay_true))
}

macro_rules! condition_kind {
    ($ty:ty, $kind:literal) => {
        impl MonitorFactory for $ty {
            const KIND: &'static str = $kind;
            const CONDITION: bool = true;

            fn into_monitor(self, name: &str, stay_true: bool) -> Monitor {
                Monitor::condition(name, Box::new(self), stay_true)
            }
        }
    };
}

macro_rules! payload_kind {
    ($ty:ty, $kind:literal) => {
        impl MonitorFactory for $ty {
            const KIND: &'static str = $kind;
            const CONDITION: bool = false;

            fn into_monitor(self, name: &str, _stay_true: bool) -> Monitor {
                Monitor::payload(name, Box::new(self))
            }
        }
    };
}

condition_kind!(JointGoalReached, "JointGoalReached");
condition_kind!(PositionReached, "PositionReached");
condition_kind!(TimeAbove, "TimeAbove");

payload_kind!(EndMotion, "EndMotion");
payload_kind!(SetMaxTrajectoryLength, "SetMaxTrajectoryLength");
payload_kind!(Sleep, "Sleep");
payload_kind!(Print, "Print");

impl MonitorFactory for LocalMinimumReached {
    const KIND: &'static str = "LocalMinimumReached";
    const CONDITION: bool = true;

    fn into_monitor(self, name: &str, stay_true: bool) -> Monitor {
        Monitor::condition(name, Box::new(self), stay_true)
    }

    fn validate(&self) -> Result<(), ParamError> {
        Ok(self.check()?)
    }
}

impl MonitorFactory for Alternator {
    const KIND: &'static str = "Alternator";
    const CONDITION: bool = false;

    fn into_monitor(self, name: &str, _stay_true: bool) -> Monitor {
        Monitor::payload(name, Box::new(self))
    }

    fn validate(&self) -> Result<(), ParamError> {
        if self.modulo == 0 {
            return Err("modulo: must be positive".into());
        }
        Ok(())
    }
}

impl MonitorFactory for CancelMotion {
    const KIND: &'static str = "CancelMotion";
    const CONDITION: bool = false;

    fn into_monitor(mut self, name: &str, _stay_true: bool) -> Monitor {
        self.monitor = name.to_string();
        Monitor::payload(name, Box::new(self))
    }
}
