//! [`FeedWatchdog`] – staleness tracking for inbound data feeds.
//!
//! The scheduler reports, once per tick, whether each feed (the joint-state
//! stream, for one) delivered a fresh sample.  A feed is *stale* once it has
//! gone more than its allowance of consecutive ticks without one.  Time is
//! counted in ticks, not wall-clock, so a replayed episode flags the same
//! ticks as the live one.

use std::collections::BTreeMap;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedHealth {
    /// A sample arrived within the allowance.
    Fresh,
    /// No sample for longer than the allowance.
    Stale { missed: u64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct FeedEntry {
    allowance: u64,
    missed: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// FeedWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// # Example
///
/// ```
/// use motum_kernel::watchdog::{FeedHealth, FeedWatchdog};
///
/// let mut wd = FeedWatchdog::new();
/// wd.register("joint_states", 2);
/// wd.missed("joint_states");
/// wd.missed("joint_states");
/// assert_eq!(wd.health("joint_states"), FeedHealth::Fresh);
/// wd.missed("joint_states");
/// assert_eq!(wd.health("joint_states"), FeedHealth::Stale { missed: 3 });
/// ```
#[derive(Default)]
pub struct FeedWatchdog {
    feeds: BTreeMap<String, FeedEntry>,
}

impl FeedWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `feed`, tolerating `allowance` consecutive missed ticks.
    ///
    /// Re-registering resets the miss counter.
    pub fn register(&mut self, feed: &str, allowance: u64) {
        self.feeds.insert(feed.to_string(), FeedEntry { allowance, missed: 0 });
    }

    /// A fresh sample arrived on `feed` this tick.
    pub fn fed(&mut self, feed: &str) {
        if let Some(entry) = self.feeds.get_mut(feed) {
            entry.missed = 0;
        }
    }

    /// `feed` produced nothing this tick.  Returns `true` on the tick the
    /// feed first turns stale, so callers can log the transition once.
    pub fn missed(&mut self, feed: &str) -> bool {
        match self.feeds.get_mut(feed) {
            Some(entry) => {
                entry.missed += 1;
                entry.missed == entry.allowance + 1
            }
            None => false,
        }
    }

    /// Unknown feeds are reported stale.
    pub fn health(&self, feed: &str) -> FeedHealth {
        match self.feeds.get(feed) {
            Some(entry) if entry.missed <= entry.allowance => FeedHealth::Fresh,
            Some(entry) => FeedHealth::Stale { missed: entry.missed },
            None => FeedHealth::Stale { missed: 0 },
        }
    }

    /// Names of all stale feeds, in name order.
    pub fn stale(&self) -> Vec<String> {
        self.feeds
            .iter()
            .filter(|(_, entry)| entry.missed > entry.allowance)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_feed_is_healthy() {
        let mut wd = FeedWatchdog::new();
        wd.register("joint_states", 3);
        assert_eq!(wd.health("joint_states"), FeedHealth::Fresh);
    }

    #[test]
    fn sample_resets_miss_count() {
        let mut wd = FeedWatchdog::new();
        wd.register("joint_states", 1);
        wd.missed("joint_states");
        wd.fed("joint_states");
        wd.missed("joint_states");
        assert_eq!(wd.health("joint_states"), FeedHealth::Fresh);
    }

    #[test]
    fn transition_to_stale_is_reported_once() {
        let mut wd = FeedWatchdog::new();
        wd.register("joint_states", 1);
        assert!(!wd.missed("joint_states"));
        assert!(wd.missed("joint_states"));
        assert!(!wd.missed("joint_states"));
        assert_eq!(wd.health("joint_states"), FeedHealth::Stale { missed: 3 });
    }

    #[test]
    fn stale_lists_only_silent_feeds() {
        let mut wd = FeedWatchdog::new();
        wd.register("joint_states", 0);
        wd.register("odometry", 10);
        wd.missed("joint_states");
        wd.missed("odometry");
        assert_eq!(wd.stale(), vec!["joint_states".to_string()]);
    }

    #[test]
    fn unknown_feed_is_stale_and_ignored() {
        let mut wd = FeedWatchdog::new();
        assert!(!wd.missed("ghost"));
        wd.fed("ghost");
        assert_eq!(wd.health("ghost"), FeedHealth::Stale { missed: 0 });
    }

    #[test]
    fn reregister_resets_counter() {
        let mut wd = FeedWatchdog::new();
        wd.register("joint_states", 0);
        wd.missed("joint_states");
        wd.register("joint_states", 0);
        assert_eq!(wd.health("joint_states"), FeedHealth::Fresh);
    }
}
