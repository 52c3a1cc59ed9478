//! In-process simulated robot for headless runs and CI without hardware.
//!
//! [`SimWorld`] holds a kinematic robot and a set of static world-frame
//! obstacles behind a shared handle.  It hands out a [`SimLidar`] that
//! reports the obstacles in the robot's sensor frame and a [`SimDriveBase`]
//! that moves the robot according to the drive commands it receives, so the
//! full perception → decision → actuation loop can be closed in-process.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point2;
//! use navloop_hal::sim::{SimWorld, SimWorldConfig};
//! use navloop_hal::{DriveActuator, PerceptionSource};
//! use navloop_types::{DriveCommand, DriveSpeeds, RobotPose};
//!
//! let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default())
//!     .with_obstacle(Point2::new(0.0, 2.0));
//! let mut lidar = world.lidar();
//! let mut base = world.drive_base();
//!
//! base.dispatch(DriveCommand::Forward, DriveSpeeds::new(10.0, 5.0));
//! assert!(world.pose().y > 0.0);
//! assert!(lidar.read().is_connected());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use nalgebra::Point2;
use navloop_perception::FrameTransform;
use navloop_types::{DriveCommand, DriveSpeeds, PerceptionSnapshot, RobotPose};
use tracing::trace;

use crate::actuator::DriveActuator;
use crate::perception::PerceptionSource;

/// Number of most recent drive commands kept by [`SimWorld::commands`].
pub const COMMAND_LOG_CAPACITY: usize = 256;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Kinematic parameters of the simulated robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimWorldConfig {
    /// Seconds of motion integrated per dispatched command.
    pub time_step: f64,
    /// Metres per second produced by one unit of linear speed.
    pub meters_per_linear_unit: f64,
    /// Radians per second produced by one unit of angular speed.
    pub radians_per_angular_unit: f64,
    /// Obstacles farther than this from the robot are not reported.
    pub sensor_range: f64,
}

impl Default for SimWorldConfig {
    fn default() -> Self {
        Self {
            time_step: 0.25,
            meters_per_linear_unit: 0.05,
            radians_per_angular_unit: 0.2,
            sensor_range: 5.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared world state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct WorldState {
    pose: RobotPose,
    obstacles: Vec<Point2<f64>>,
    connected: bool,
    commands: VecDeque<DriveCommand>,
}

/// Shared handle to the simulated world.  Cloning yields another handle to
/// the same world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    config: SimWorldConfig,
    state: Arc<Mutex<WorldState>>,
}

impl SimWorld {
    /// Create a world with the robot at `start` and no obstacles.
    pub fn new(config: SimWorldConfig, start: RobotPose) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(WorldState {
                pose: start,
                obstacles: Vec::new(),
                connected: true,
                commands: VecDeque::with_capacity(COMMAND_LOG_CAPACITY),
            })),
        }
    }

    /// Add a static obstacle at a world-frame position.
    pub fn with_obstacle(self, position: Point2<f64>) -> Self {
        self.lock().obstacles.push(position);
        self
    }

    pub fn config(&self) -> SimWorldConfig {
        self.config
    }

    /// Current robot pose.
    pub fn pose(&self) -> RobotPose {
        self.lock().pose
    }

    /// Simulate the sensor link going down (`false`) or coming back (`true`).
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// The last [`COMMAND_LOG_CAPACITY`] commands the drive base received,
    /// oldest first.
    pub fn commands(&self) -> Vec<DriveCommand> {
        self.lock().commands.iter().copied().collect()
    }

    /// A lidar mounted on the simulated robot.
    pub fn lidar(&self) -> SimLidar {
        SimLidar {
            id: "sim_lidar".to_string(),
            world: self.clone(),
        }
    }

    /// The simulated robot's drive base.
    pub fn drive_base(&self) -> SimDriveBase {
        SimDriveBase {
            id: "sim_drive_base".to_string(),
            world: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        // Plain data: a poisoned lock still holds a consistent state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated lidar
// ────────────────────────────────────────────────────────────────────────────

/// Reports in-range world obstacles in the robot's sensor frame together with
/// the true robot pose.
pub struct SimLidar {
    id: String,
    world: SimWorld,
}

impl PerceptionSource for SimLidar {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> PerceptionSnapshot {
        let state = self.world.lock();
        if !state.connected {
            return PerceptionSnapshot::NotConnected;
        }
        let pose = state.pose;
        let tf = FrameTransform::from_pose(&pose);
        let range = self.world.config.sensor_range;
        let points = state
            .obstacles
            .iter()
            .filter(|o| nalgebra::distance(*o, &pose.position()) <= range)
            .map(|o| tf.inverse_apply(o))
            .collect();
        PerceptionSnapshot::Frame { points, pose }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated drive base
// ────────────────────────────────────────────────────────────────────────────

/// Integrates each drive command over one simulated time step.
pub struct SimDriveBase {
    id: String,
    world: SimWorld,
}

impl DriveActuator for SimDriveBase {
    fn id(&self) -> &str {
        &self.id
    }

    fn dispatch(&mut self, command: DriveCommand, speeds: DriveSpeeds) {
        let cfg = self.world.config;
        let mut state = self.world.lock();
        if state.commands.len() == COMMAND_LOG_CAPACITY {
            state.commands.pop_front();
        }
        state.commands.push_back(command);

        let step = speeds.linear * cfg.meters_per_linear_unit * cfg.time_step;
        let turn = speeds.angular * cfg.radians_per_angular_unit * cfg.time_step;
        let forward = state.pose.heading_forward();
        let pose = &mut state.pose;
        match command {
            DriveCommand::Forward => {
                pose.x += forward.vx * step;
                pose.y += forward.vy * step;
            }
            DriveCommand::Backward => {
                pose.x -= forward.vx * step;
                pose.y -= forward.vy * step;
            }
            DriveCommand::TurnLeft => pose.yaw = wrap_angle(pose.yaw + turn),
            DriveCommand::TurnRight => pose.yaw = wrap_angle(pose.yaw - turn),
            DriveCommand::Stop => {}
        }
        trace!(command = %command, x = pose.x, y = pose.y, yaw = pose.yaw, "sim drive base moved");
    }
}

/// Wrap an angle into `(-π, π]`.
fn wrap_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
