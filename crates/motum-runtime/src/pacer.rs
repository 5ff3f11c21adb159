//! [`TickPacer`] – holds a loop to a fixed wall-clock rate.
//!
//! Deadlines advance by exactly one period per [`wait`](TickPacer::wait), so
//! short jitter does not accumulate.  A tick that overruns its deadline by
//! more than a full period resets the schedule instead of bursting to catch
//! up.

use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    last: Instant,
    overruns: u64,
}

impl TickPacer {
    /// The first deadline is one period from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Instant::now(),
            overruns: 0,
        }
    }

    /// `None` for a period that is not a finite, non-negative number of seconds.
    pub fn from_secs_f64(seconds: f64) -> Option<Self> {
        Duration::try_from_secs_f64(seconds).ok().map(Self::new)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Deadlines missed by more than a period so far.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Sleep until the next deadline.
    pub fn wait(&mut self) {
        let deadline = self.last + self.period;
        let now = Instant::now();
        if now < deadline {
            std::thread::sleep(deadline - now);
            self.last = deadline;
            return;
        }
        let late = now - deadline;
        if late > self.period {
            self.overruns += 1;
            warn!(
                late_ms = late.as_secs_f64() * 1000.0,
                period_ms = self.period.as_secs_f64() * 1000.0,
                "tick overran its period; resetting schedule"
            );
            self.last = now;
        } else {
            self.last = deadline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_add_up_to_whole_periods() {
        let period = Duration::from_millis(10);
        let start = Instant::now();
        let mut pacer = TickPacer::new(period);
        for _ in 0..5 {
            pacer.wait();
        }
        assert!(start.elapsed() >= period * 5);
        assert_eq!(pacer.overruns(), 0);
    }

    #[test]
    fn long_overrun_resets_instead_of_bursting() {
        let period = Duration::from_millis(5);
        let mut pacer = TickPacer::new(period);
        std::thread::sleep(period * 4);
        pacer.wait();
        assert_eq!(pacer.overruns(), 1);

        // The schedule restarted at the overrun, so the next wait sleeps again.
        let before = Instant::now();
        pacer.wait();
        assert!(before.elapsed() >= period / 2);
    }

    #[test]
    fn invalid_periods_are_refused() {
        assert!(TickPacer::from_secs_f64(-0.1).is_none());
        assert!(TickPacer::from_secs_f64(f64::NAN).is_none());
        assert_eq!(TickPacer::from_secs_f64(0.5).map(|p| p.period()), Some(Duration::from_millis(500)));
    }
}
