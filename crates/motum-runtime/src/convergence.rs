//! [`ConvergenceWindow`] – "the robot has stopped moving" detector.
//!
//! # Algorithm
//!
//! The window keeps the peak commanded joint speed of the last *N* ticks.
//! After each [`ConvergenceWindow::record`] it checks whether the window is
//! full and every entry is below the threshold.  If so the motion has
//! settled and an episode without explicit end monitors may succeed.
//!
//! # Example
//!
//! ```rust
//! use motum_runtime::convergence::ConvergenceWindow;
//!
//! let mut window = ConvergenceWindow::new(3, 0.01);
//!
//! assert!(!window.record(0.001));
//! assert!(!window.record(0.002));
//! assert!(window.record(0.0)); // third quiet tick → settled
//!
//! // Any fast tick breaks the streak.
//! assert!(!window.record(0.5));
//! ```

use std::collections::{BTreeMap, VecDeque};

// ─────────────────────────────────────────────────────────────────────────────
// ConvergenceWindow
// ─────────────────────────────────────────────────────────────────────────────

pub struct ConvergenceWindow {
    /// Number of consecutive quiet ticks required.
    size: usize,
    threshold: f64,
    /// Peak |velocity| of the most recent ticks.
    recent: VecDeque<f64>,
}

impl ConvergenceWindow {
    /// A `size` of 0 is treated as 1.
    pub fn new(size: usize, threshold: f64) -> Self {
        let size = size.max(1);
        Self {
            size,
            threshold,
            recent: VecDeque::with_capacity(size),
        }
    }

    /// Record this tick's peak commanded speed; returns [`is_converged`].
    ///
    /// [`is_converged`]: ConvergenceWindow::is_converged
    pub fn record(&mut self, peak_speed: f64) -> bool {
        self.recent.push_back(peak_speed.abs());
        while self.recent.len() > self.size {
            self.recent.pop_front();
        }
        self.is_converged()
    }

    /// Record the peak of a velocity command.  An empty command counts as
    /// standing still.
    pub fn record_command(&mut self, command: &BTreeMap<String, f64>) -> bool {
        let peak = command.values().fold(0.0_f64, |m, v| m.max(v.abs()));
        self.record(peak)
    }

    pub fn is_converged(&self) -> bool {
        self.recent.len() == self.size && self.recent.iter().all(|v| *v < self.threshold)
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}
