//! Startup configuration – reads `~/.navloop/config.toml`.
//!
//! Every field has a default, so a missing file (or a file that only sets a
//! few keys) is fine.  Values are validated once before the control loop is
//! built; anything invalid aborts startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nalgebra::Point2;
use navloop_hal::sim::{SimWorld, SimWorldConfig};
use navloop_runtime::{ControlLoopConfig, TURN_LEFT_THRESHOLD_RAD, TURN_RIGHT_THRESHOLD_RAD};
use navloop_types::{DriveSpeeds, NavError, RobotPose};
use serde::{Deserialize, Serialize};

/// Persisted configuration stored in `~/.navloop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Built-in decision policy: `"goal_seek"` or `"hold"`.
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Perception voxel edge in metres; obstacle radius is half of it.
    #[serde(default = "default_voxel_size")]
    pub voxel_size: f64,

    /// Linear magnitude sent with every drive command (controller units).
    #[serde(default = "default_linear_speed")]
    pub linear_speed: f64,

    /// Angular magnitude sent with every drive command (controller units).
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f64,

    #[serde(default = "default_turn_left_threshold")]
    pub turn_left_threshold: f64,

    #[serde(default = "default_turn_right_threshold")]
    pub turn_right_threshold: f64,

    /// Control period assumed by the decision function, in seconds.
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    #[serde(default = "default_robot_radius")]
    pub robot_radius: f64,

    /// Preferred speed in m/s.
    #[serde(default = "default_v_pref")]
    pub v_pref: f64,

    #[serde(default)]
    pub goal_x: f64,

    #[serde(default = "default_goal_y")]
    pub goal_y: f64,

    /// Warn after the sensor link has been down this long.
    #[serde(default = "default_link_warn_after_ms")]
    pub link_warn_after_ms: u64,

    /// Stop after this many processed cycles.  Unset: run until Ctrl-C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u64>,

    /// Write the recorded trajectory here as JSON on exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory_file: Option<PathBuf>,

    /// Simulated robot used when no hardware driver is wired in.
    #[serde(default)]
    pub sim: SimConfig,
}

/// The `[sim]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub start_x: f64,
    #[serde(default)]
    pub start_y: f64,
    #[serde(default)]
    pub start_yaw: f64,
    /// World-frame obstacle positions, `[[x, y], …]`.
    #[serde(default = "default_sim_obstacles")]
    pub obstacles: Vec<[f64; 2]>,
    #[serde(default = "default_sensor_range")]
    pub sensor_range: f64,
}

fn default_policy() -> String {
    "goal_seek".to_string()
}
fn default_voxel_size() -> f64 {
    0.45
}
fn default_linear_speed() -> f64 {
    10.0
}
fn default_angular_speed() -> f64 {
    5.0
}
fn default_turn_left_threshold() -> f64 {
    TURN_LEFT_THRESHOLD_RAD
}
fn default_turn_right_threshold() -> f64 {
    TURN_RIGHT_THRESHOLD_RAD
}
fn default_time_step() -> f64 {
    0.25
}
fn default_robot_radius() -> f64 {
    0.3
}
fn default_v_pref() -> f64 {
    1.0
}
fn default_goal_y() -> f64 {
    4.0
}
fn default_link_warn_after_ms() -> u64 {
    2000
}
fn default_sim_obstacles() -> Vec<[f64; 2]> {
    vec![[0.3, 2.0], [-1.2, 3.0]]
}
fn default_sensor_range() -> f64 {
    5.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_x: 0.0,
            start_y: 0.0,
            start_yaw: 0.0,
            obstacles: default_sim_obstacles(),
            sensor_range: default_sensor_range(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            voxel_size: default_voxel_size(),
            linear_speed: default_linear_speed(),
            angular_speed: default_angular_speed(),
            turn_left_threshold: default_turn_left_threshold(),
            turn_right_threshold: default_turn_right_threshold(),
            time_step: default_time_step(),
            robot_radius: default_robot_radius(),
            v_pref: default_v_pref(),
            goal_x: 0.0,
            goal_y: default_goal_y(),
            link_warn_after_ms: default_link_warn_after_ms(),
            max_cycles: None,
            trajectory_file: None,
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<(), NavError> {
        let positive = [
            ("voxel_size", self.voxel_size),
            ("linear_speed", self.linear_speed),
            ("angular_speed", self.angular_speed),
            ("time_step", self.time_step),
            ("robot_radius", self.robot_radius),
            ("v_pref", self.v_pref),
            ("sim.sensor_range", self.sim.sensor_range),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(NavError::Config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let finite = [
            ("goal_x", self.goal_x),
            ("goal_y", self.goal_y),
            ("turn_left_threshold", self.turn_left_threshold),
            ("turn_right_threshold", self.turn_right_threshold),
            ("sim.start_x", self.sim.start_x),
            ("sim.start_y", self.sim.start_y),
            ("sim.start_yaw", self.sim.start_yaw),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(NavError::Config(format!("{name} must be finite, got {value}")));
            }
        }
        if self.turn_left_threshold >= self.turn_right_threshold {
            return Err(NavError::Config(format!(
                "turn_left_threshold ({}) must be below turn_right_threshold ({})",
                self.turn_left_threshold, self.turn_right_threshold
            )));
        }
        if self.max_cycles == Some(0) {
            return Err(NavError::Config(
                "max_cycles must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parameters for the control loop.
    pub fn loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            robot_radius: self.robot_radius,
            goal_x: self.goal_x,
            goal_y: self.goal_y,
            v_pref: self.v_pref,
            time_step: self.time_step,
            voxel_size: self.voxel_size,
            speeds: DriveSpeeds::new(self.linear_speed, self.angular_speed),
            turn_left_threshold: self.turn_left_threshold,
            turn_right_threshold: self.turn_right_threshold,
            link_warn_after: Duration::from_millis(self.link_warn_after_ms),
        }
    }

    /// Build the simulated robot described by the `[sim]` table.
    pub fn sim_world(&self) -> SimWorld {
        let sim_config = SimWorldConfig {
            time_step: self.time_step,
            sensor_range: self.sim.sensor_range,
            ..SimWorldConfig::default()
        };
        let start = RobotPose::new(self.sim.start_x, self.sim.start_y, self.sim.start_yaw);
        self.sim
            .obstacles
            .iter()
            .fold(SimWorld::new(sim_config, start), |world, [x, y]| {
                world.with_obstacle(Point2::new(*x, *y))
            })
    }
}

/// Return the config path: `$NAVLOOP_CONFIG` if set, else
/// `~/.navloop/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("NAVLOOP_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".navloop").join("config.toml")
}

/// Load, override from the environment, and validate the configuration.
/// A missing file yields the defaults.
pub fn load() -> Result<Config, NavError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse the config at `path`.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, NavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        NavError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw).map_err(|e| {
        NavError::Config(format!("failed to parse config at {}: {e}", path.display()))
    })?;
    Ok(Some(cfg))
}

/// Apply `NAVLOOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `NAVLOOP_POLICY` | `policy` |
/// | `NAVLOOP_VOXEL_SIZE` | `voxel_size` |
/// | `NAVLOOP_LINEAR_SPEED` | `linear_speed` |
/// | `NAVLOOP_ANGULAR_SPEED` | `angular_speed` |
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), NavError> {
    apply_overrides(cfg, |var| std::env::var(var).ok())
}

/// Apply overrides looked up through `lookup` (variable name → raw value).
pub(crate) fn apply_overrides<F>(cfg: &mut Config, lookup: F) -> Result<(), NavError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("NAVLOOP_POLICY") {
        cfg.policy = v;
    }
    override_f64("NAVLOOP_VOXEL_SIZE", lookup("NAVLOOP_VOXEL_SIZE"), &mut cfg.voxel_size)?;
    override_f64("NAVLOOP_LINEAR_SPEED", lookup("NAVLOOP_LINEAR_SPEED"), &mut cfg.linear_speed)?;
    override_f64(
        "NAVLOOP_ANGULAR_SPEED",
        lookup("NAVLOOP_ANGULAR_SPEED"),
        &mut cfg.angular_speed,
    )?;
    Ok(())
}

fn override_f64(var: &str, value: Option<String>, field: &mut f64) -> Result<(), NavError> {
    if let Some(v) = value {
        *field = v
            .trim()
            .parse()
            .map_err(|e| NavError::Config(format!("{var}={v:?} is not a number: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().expect("defaults must validate");
        assert_eq!(cfg.policy, "goal_seek");
        assert_eq!(cfg.voxel_size, 0.45);
        assert_eq!(cfg.linear_speed, 10.0);
        assert_eq!(cfg.angular_speed, 5.0);
        assert_eq!(cfg.turn_left_threshold, -0.7);
        assert_eq!(cfg.turn_right_threshold, 0.7);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "linear_speed = 14.0\n[sim]\nstart_yaw = 0.5\n").unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.linear_speed, 14.0);
        assert_eq!(cfg.angular_speed, 5.0);
        assert_eq!(cfg.sim.start_yaw, 0.5);
        assert_eq!(cfg.sim.obstacles, default_sim_obstacles());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, toml::to_string_pretty(&Config::default()).unwrap()).unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "voxel_size = \"big\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(NavError::Config(_))));
    }

    #[test]
    fn config_path_points_to_navloop_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".navloop"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn validate_rejects_non_positive_voxel_size() {
        let cfg = Config {
            voxel_size: 0.0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(NavError::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let cfg = Config {
            turn_left_threshold: 0.7,
            turn_right_threshold: -0.7,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(NavError::Config(_))));
    }

    #[test]
    fn validate_rejects_nan_goal() {
        let cfg = Config {
            goal_x: f64::NAN,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(NavError::Config(_))));
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn overrides_change_policy_and_speed() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[("NAVLOOP_POLICY", "hold"), ("NAVLOOP_LINEAR_SPEED", " 14 ")]),
        )
        .expect("valid overrides");
        assert_eq!(cfg.policy, "hold");
        assert_eq!(cfg.linear_speed, 14.0);
        assert_eq!(cfg.angular_speed, Config::default().angular_speed);
    }

    #[test]
    fn overrides_reject_garbage_number() {
        let mut cfg = Config::default();
        let result = apply_overrides(&mut cfg, lookup_from(&[("NAVLOOP_ANGULAR_SPEED", "fast")]));
        assert!(matches!(result, Err(NavError::Config(_))));
    }

    #[test]
    fn no_overrides_leave_config_untouched() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, lookup_from(&[])).expect("nothing to apply");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn loop_config_carries_speeds_and_thresholds() {
        let cfg = Config {
            linear_speed: 14.0,
            angular_speed: 25.0,
            ..Config::default()
        };
        let lc = cfg.loop_config();
        assert_eq!(lc.speeds, DriveSpeeds::new(14.0, 25.0));
        assert_eq!(lc.turn_left_threshold, -0.7);
        assert_eq!(lc.link_warn_after, Duration::from_secs(2));
    }

    #[test]
    fn sim_world_places_configured_obstacles() {
        use navloop_hal::PerceptionSource;
        use navloop_types::PerceptionSnapshot;

        let cfg = Config::default();
        let world = cfg.sim_world();
        assert_eq!(world.pose(), RobotPose::default());
        assert_eq!(world.config().time_step, 0.25);
        match world.lidar().read() {
            PerceptionSnapshot::Frame { points, .. } => assert_eq!(points.len(), 2),
            PerceptionSnapshot::NotConnected => panic!("sim lidar should be connected"),
        }
    }
}
