//! CLI configuration – reads/writes `~/.motum/config.toml`.
//!
//! ```toml
//! [controller]
//! sample_period = 0.05
//! max_trajectory_length = 30.0
//!
//! [controller.collision_avoidance]
//! max_velocity = 0.2
//!
//! [robot]
//! description = "/path/to/robot.json"   # omit for the built-in planar arm
//! damping = 0.0001
//! ```

use motum_types::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which simulated robot to drive and how its solver is tuned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// JSON or TOML robot description; the built-in planar arm when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<PathBuf>,

    /// Damping of the reference least-squares solver.
    #[serde(default = "default_damping")]
    pub damping: f64,
}

fn default_damping() -> f64 {
    1e-4
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            description: None,
            damping: default_damping(),
        }
    }
}

/// Persisted configuration stored in `~/.motum/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub robot: RobotConfig,
}

/// Return the path to `~/.motum/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".motum").join("config.toml")
}

/// Load the config from a specific path.  `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    validate(&cfg).map_err(|e| format!("Invalid config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Load from `path`, or the default location; fall back to defaults (with
/// environment overrides) when the file is absent.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, String> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    match load_from(&path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            validate(&cfg).map_err(|e| format!("Invalid config: {}", e))?;
            Ok(cfg)
        }
    }
}

/// Check value ranges the controller relies on.
pub fn validate(cfg: &Config) -> Result<(), String> {
    cfg.controller.validate().map_err(|e| format!("controller.{}", e))?;
    if !cfg.robot.damping.is_finite() || cfg.robot.damping < 0.0 {
        return Err(format!("robot.damping: must not be negative, got {}", cfg.robot.damping));
    }
    Ok(())
}

/// Apply `MOTUM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MOTUM_SAMPLE_PERIOD` | `controller.sample_period` |
/// | `MOTUM_MAX_TRAJECTORY_LENGTH` | `controller.max_trajectory_length` |
/// | `MOTUM_FIRST_SAMPLE_TIMEOUT_MS` | `controller.first_sample_timeout_ms` |
///
/// Unparsable or non-positive values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MOTUM_SAMPLE_PERIOD")
        && let Ok(period) = v.parse::<f64>()
        && period > 0.0
    {
        cfg.controller.sample_period = period;
    }
    if let Ok(v) = std::env::var("MOTUM_MAX_TRAJECTORY_LENGTH")
        && let Ok(length) = v.parse::<f64>()
        && length > 0.0
    {
        cfg.controller.max_trajectory_length = length;
    }
    if let Ok(v) = std::env::var("MOTUM_FIRST_SAMPLE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.controller.first_sample_timeout_ms = ms;
    }
}

/// Save the config to a specific path, creating the parent directory.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.controller.prediction_horizon, 7);
        assert_eq!(loaded.controller.collision_avoidance, cfg.controller.collision_avoidance);
        assert_eq!(loaded.robot, RobotConfig::default());
    }

    #[test]
    fn partial_tables_keep_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[controller]\nconvergence_window = 4\n\n[controller.collision_avoidance]\nmax_velocity = 0.5\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.controller.convergence_window, 4);
        assert_eq!(cfg.controller.collision_avoidance.max_velocity, 0.5);
        assert_eq!(cfg.controller.minimum_episode_time, 1.0);
        assert!(cfg.robot.description.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[controller\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"), "{err}");
    }

    #[test]
    fn negative_collision_velocity_is_rejected_at_load() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[controller.collision_avoidance]\nmax_velocity = -0.2\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("controller.collision_avoidance.max_velocity"), "{err}");
        assert!(load_or_default(Some(&path)).is_err());
    }

    #[test]
    fn negative_damping_is_rejected() {
        let mut cfg = Config::default();
        cfg.robot.damping = -1.0;
        assert!(validate(&cfg).unwrap_err().starts_with("robot.damping"));
        assert_eq!(validate(&Config::default()), Ok(()));
    }

    #[test]
    fn config_path_points_to_motum_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".motum"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
        assert_eq!(load_or_default(Some(&path)).unwrap().robot.damping, 1e-4);
    }

    // Each test owns a distinct variable so parallel tests do not race.

    #[test]
    fn env_overrides_sample_period() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("MOTUM_SAMPLE_PERIOD", "0.01") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.controller.sample_period, 0.01);
        unsafe { std::env::remove_var("MOTUM_SAMPLE_PERIOD") };
    }

    #[test]
    fn env_overrides_ignore_invalid_length() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("MOTUM_MAX_TRAJECTORY_LENGTH", "-3") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.controller.max_trajectory_length, 30.0);
        unsafe { std::env::remove_var("MOTUM_MAX_TRAJECTORY_LENGTH") };
    }

    #[test]
    fn env_overrides_first_sample_timeout() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("MOTUM_FIRST_SAMPLE_TIMEOUT_MS", "1500") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.controller.first_sample_timeout_ms, 1500);
        unsafe { std::env::remove_var("MOTUM_FIRST_SAMPLE_TIMEOUT_MS") };
    }
}
