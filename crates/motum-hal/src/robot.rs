//! Generic `RobotInterface` trait for whatever executes joint commands.
//!
//! Drivers implement this trait; the control loop only ever talks to it, so
//! a simulated robot and real hardware are interchangeable.  Joint feedback
//! travels the other way through a [`JointStateSlot`][crate::feedback::JointStateSlot].

use std::collections::BTreeMap;

use motum_types::MotumError;

pub trait RobotInterface: Send {
    /// Stable identifier, e.g. `"sim"` or `"left_arm"`.
    fn id(&self) -> &str;

    /// Apply one tick of joint velocity commands.
    ///
    /// # Errors
    ///
    /// [`MotumError::Hardware`] when the command cannot be applied.
    fn send_velocities(&mut self, commands: &BTreeMap<String, f64>) -> Result<(), MotumError>;

    /// Supersede every previously applied command with a stop.
    fn stop(&mut self) -> Result<(), MotumError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process driver used only for tests.
    struct RecordingRobot {
        last: BTreeMap<String, f64>,
        stopped: bool,
    }

    impl RobotInterface for RecordingRobot {
        fn id(&self) -> &str {
            "recording"
        }

        fn send_velocities(&mut self, commands: &BTreeMap<String, f64>) -> Result<(), MotumError> {
            if commands.values().any(|v| !v.is_finite()) {
                return Err(MotumError::Hardware {
                    component: self.id().to_string(),
                    details: "non-finite velocity".into(),
                });
            }
            self.last = commands.clone();
            self.stopped = false;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), MotumError> {
            self.last.values_mut().for_each(|v| *v = 0.0);
            self.stopped = true;
            Ok(())
        }
    }

    #[test]
    fn robot_is_usable_as_trait_object() {
        let mut robot: Box<dyn RobotInterface> = Box::new(RecordingRobot {
            last: BTreeMap::new(),
            stopped: false,
        });
        let cmd = BTreeMap::from([("j1".to_string(), 0.2)]);
        robot.send_velocities(&cmd).unwrap();
        robot.stop().unwrap();
        let bad = BTreeMap::from([("j1".to_string(), f64::NAN)]);
        assert!(matches!(robot.send_velocities(&bad), Err(MotumError::Hardware { .. })));
    }
}
