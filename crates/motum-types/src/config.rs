//! Controller and collision-avoidance configuration.
//!
//! Every field has a serde default so a partial TOML table is enough.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_sample_period() -> f64 {
    0.05
}
fn default_prediction_horizon() -> usize {
    7
}
fn default_max_derivative() -> usize {
    3
}
fn default_max_trajectory_length() -> f64 {
    30.0
}
fn default_first_sample_timeout_ms() -> u64 {
    500
}
fn default_convergence_velocity() -> f64 {
    0.01
}
fn default_convergence_window() -> usize {
    10
}
fn default_minimum_episode_time() -> f64 {
    1.0
}

/// Settings of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Seconds of control time per tick.
    #[serde(default = "default_sample_period")]
    pub sample_period: f64,
    #[serde(default = "default_prediction_horizon")]
    pub prediction_horizon: usize,
    /// Highest derivative the solver plans (3 = jerk).
    #[serde(default = "default_max_derivative")]
    pub max_derivative: usize,
    /// Control-time budget of one episode, in seconds.
    #[serde(default = "default_max_trajectory_length")]
    pub max_trajectory_length: f64,
    /// How long the first sync waits for a joint-state sample.
    #[serde(default = "default_first_sample_timeout_ms")]
    pub first_sample_timeout_ms: u64,
    /// Consecutive sync timeouts tolerated before failing; `None` retries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_timeout_budget: Option<u32>,
    #[serde(default = "default_convergence_velocity")]
    pub convergence_velocity: f64,
    #[serde(default = "default_convergence_window")]
    pub convergence_window: usize,
    /// Implicit success is never declared before this much control time.
    #[serde(default = "default_minimum_episode_time")]
    pub minimum_episode_time: f64,
    #[serde(default)]
    pub collision_avoidance: CollisionAvoidanceConfig,
    /// Hold every tick to `sample_period` of wall-clock time.  Off for the
    /// simulator, on for a robot that consumes commands in real time.
    #[serde(default)]
    pub realtime: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_period: default_sample_period(),
            prediction_horizon: default_prediction_horizon(),
            max_derivative: default_max_derivative(),
            max_trajectory_length: default_max_trajectory_length(),
            first_sample_timeout_ms: default_first_sample_timeout_ms(),
            sensor_timeout_budget: None,
            convergence_velocity: default_convergence_velocity(),
            convergence_window: default_convergence_window(),
            minimum_episode_time: default_minimum_episode_time(),
            collision_avoidance: CollisionAvoidanceConfig::default(),
            realtime: false,
        }
    }
}

impl ControllerConfig {
    /// Number of future ticks the solver plans over.
    pub fn control_horizon(&self) -> usize {
        let dropped = self.max_derivative.saturating_sub(1);
        self.prediction_horizon.saturating_sub(dropped).max(1)
    }

    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        positive("sample_period", self.sample_period)?;
        positive("max_trajectory_length", self.max_trajectory_length)?;
        non_negative("convergence_velocity", self.convergence_velocity)?;
        non_negative("minimum_episode_time", self.minimum_episode_time)?;
        let ca = &self.collision_avoidance;
        non_negative("collision_avoidance.max_velocity", ca.max_velocity)?;
        non_negative("collision_avoidance.unchecked_distance", ca.unchecked_distance)?;
        let thresholds = std::iter::once(("external_default".to_string(), ca.external_default.hard, ca.external_default.soft))
            .chain(ca.external.iter().map(|(joint, t)| (format!("external.{joint}"), t.hard, t.soft)))
            .chain(std::iter::once(("self_default".to_string(), ca.self_default.hard, ca.self_default.soft)))
            .chain(ca.self_links.iter().map(|(link, t)| (format!("self_links.{link}"), t.hard, t.soft)))
            .chain(
                ca.self_pairs
                    .iter()
                    .map(|p| (format!("self_pairs.{}/{}", p.link_a, p.link_b), p.hard, p.soft)),
            );
        for (field, hard, soft) in thresholds {
            finite(&format!("collision_avoidance.{field}.hard"), hard)?;
            finite(&format!("collision_avoidance.{field}.soft"), soft)?;
        }
        Ok(())
    }
}

fn finite(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{field}: must be finite, got {value}"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), String> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(format!("{field}: must not be negative, got {value}"));
    }
    Ok(())
}

fn positive(field: &str, value: f64) -> Result<(), String> {
    finite(field, value)?;
    if value <= 0.0 {
        return Err(format!("{field}: must be positive, got {value}"));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Collision avoidance
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub hard: f64,
    pub soft: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hard: 0.0,
            soft: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalThresholds {
    #[serde(default)]
    pub hard: f64,
    #[serde(default = "default_soft")]
    pub soft: f64,
    #[serde(default = "default_repellers")]
    pub repellers: usize,
}

fn default_soft() -> f64 {
    0.05
}
fn default_repellers() -> usize {
    1
}

impl Default for ExternalThresholds {
    fn default() -> Self {
        Self {
            hard: 0.0,
            soft: default_soft(),
            repellers: default_repellers(),
        }
    }
}

/// Thresholds for one specific self-collision link pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairThresholds {
    pub link_a: String,
    pub link_b: String,
    pub hard: f64,
    pub soft: f64,
}

fn default_max_velocity() -> f64 {
    0.2
}
fn default_unchecked_distance() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionAvoidanceConfig {
    /// Used for joints without an entry in `external`.
    #[serde(default)]
    pub external_default: ExternalThresholds,
    /// Keyed by controlled joint name.
    #[serde(default)]
    pub external: BTreeMap<String, ExternalThresholds>,
    /// Repeller count for leaf (end-effector) joints.
    #[serde(default = "default_repellers")]
    pub eef_repellers: usize,
    #[serde(default)]
    pub self_default: Thresholds,
    /// Keyed by link name.
    #[serde(default)]
    pub self_links: BTreeMap<String, Thresholds>,
    #[serde(default)]
    pub self_pairs: Vec<PairThresholds>,
    #[serde(default = "default_repellers")]
    pub self_repellers: usize,
    /// Speed at which a repeller may push a link away, m/s.
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
    /// Distance reported for empty repeller slots.
    #[serde(default = "default_unchecked_distance")]
    pub unchecked_distance: f64,
}

impl Default for CollisionAvoidanceConfig {
    fn default() -> Self {
        Self {
            external_default: ExternalThresholds::default(),
            external: BTreeMap::new(),
            eef_repellers: default_repellers(),
            self_default: Thresholds::default(),
            self_links: BTreeMap::new(),
            self_pairs: Vec::new(),
            self_repellers: default_repellers(),
            max_velocity: default_max_velocity(),
            unchecked_distance: default_unchecked_distance(),
        }
    }
}

impl CollisionAvoidanceConfig {
    pub fn external_for(&self, joint: &str) -> ExternalThresholds {
        self.external.get(joint).copied().unwrap_or(self.external_default)
    }

    pub fn self_for_link(&self, link: &str) -> Thresholds {
        self.self_links.get(link).copied().unwrap_or(self.self_default)
    }

    /// Thresholds configured for exactly `(link_a, link_b)`, in that order.
    pub fn self_for_pair(&self, link_a: &str, link_b: &str) -> Option<Thresholds> {
        self.self_pairs
            .iter()
            .find(|p| p.link_a == link_a && p.link_b == link_b)
            .map(|p| Thresholds {
                hard: p.hard,
                soft: p.soft,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_horizon_drops_higher_derivatives() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.control_horizon(), 5);

        let short = ControllerConfig {
            prediction_horizon: 1,
            ..ControllerConfig::default()
        };
        assert_eq!(short.control_horizon(), 1);
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ControllerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn negative_rates_are_rejected() {
        let mut cfg = ControllerConfig::default();
        cfg.collision_avoidance.max_velocity = -0.2;
        let err = cfg.validate().unwrap_err();
        assert!(err.starts_with("collision_avoidance.max_velocity"), "{err}");

        let cfg = ControllerConfig {
            sample_period: 0.0,
            ..ControllerConfig::default()
        };
        assert!(cfg.validate().unwrap_err().starts_with("sample_period"));

        let mut cfg = ControllerConfig::default();
        cfg.collision_avoidance.external_default.soft = f64::NAN;
        assert!(cfg.validate().unwrap_err().contains("external_default.soft"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: ControllerConfig = serde_json::from_str(
            r#"{"sample_period": 0.01, "collision_avoidance": {"eef_repellers": 4}}"#,
        )
        .unwrap();
        assert_eq!(cfg.sample_period, 0.01);
        assert_eq!(cfg.prediction_horizon, 7);
        assert_eq!(cfg.collision_avoidance.eef_repellers, 4);
        assert_eq!(cfg.collision_avoidance.self_repellers, 1);
        assert_eq!(cfg.collision_avoidance.unchecked_distance, 100.0);
    }

    #[test]
    fn pair_lookup_is_order_sensitive() {
        let mut ca = CollisionAvoidanceConfig::default();
        ca.self_pairs.push(PairThresholds {
            link_a: "a".into(),
            link_b: "b".into(),
            hard: 0.01,
            soft: 0.2,
        });
        assert!(ca.self_for_pair("a", "b").is_some());
        assert!(ca.self_for_pair("b", "a").is_none());
    }
}
