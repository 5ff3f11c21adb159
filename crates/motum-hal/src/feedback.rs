//! Single-slot joint-state feed.
//!
//! The robot's feedback producer runs on its own thread and calls
//! [`JointStateSlot::publish`]; the control loop drains the slot at its own
//! pace.  A sample that arrives before the previous one was consumed
//! replaces it, so the slot never grows.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use motum_types::JointSample;

#[derive(Debug, Default)]
pub struct JointStateSlot {
    latest: Mutex<Option<JointSample>>,
    ready: Condvar,
}

impl JointStateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<JointSample>> {
        // A panicking producer cannot leave a half-written sample behind.
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `sample`, replacing any unconsumed one.
    pub fn publish(&self, sample: JointSample) {
        *self.lock() = Some(sample);
        self.ready.notify_all();
    }

    /// Take the latest sample without blocking.
    pub fn try_take(&self) -> Option<JointSample> {
        self.lock().take()
    }

    /// Take the latest sample, waiting up to `timeout` for one to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Option<JointSample> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |slot| slot.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    fn sample(q: f64) -> JointSample {
        JointSample {
            positions: BTreeMap::from([("j1".to_string(), q)]),
            velocities: BTreeMap::new(),
        }
    }

    #[test]
    fn newer_sample_overwrites_unconsumed_one() {
        let slot = JointStateSlot::new();
        slot.publish(sample(1.0));
        slot.publish(sample(2.0));
        assert_eq!(slot.try_take(), Some(sample(2.0)));
        assert_eq!(slot.try_take(), None);
    }

    #[test]
    fn take_timeout_returns_none_when_silent() {
        let slot = JointStateSlot::new();
        assert!(slot.take_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn take_timeout_wakes_on_publish_from_another_thread() {
        let slot = Arc::new(JointStateSlot::new());
        let producer = slot.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.publish(sample(0.5));
        });
        let got = slot.take_timeout(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(got, Some(sample(0.5)));
    }
}
