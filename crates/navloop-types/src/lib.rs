use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// World-frame robot pose as reported by the perception source.
///
/// `yaw` is measured counter-clockwise in radians.  With `yaw == 0` the robot
/// faces the world `+y` axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl RobotPose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    /// World-frame position of the robot.
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Unit vector pointing out of the front of the robot, in world frame.
    pub fn heading_forward(&self) -> RobotVelocity {
        RobotVelocity::new(-self.yaw.sin(), self.yaw.cos())
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance_to(&self, other: &RobotPose) -> f64 {
        nalgebra::distance(&self.position(), &other.position())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.yaw.is_finite()
    }
}

/// World-frame planar velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotVelocity {
    pub vx: f64,
    pub vy: f64,
}

impl RobotVelocity {
    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    pub fn norm(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Full robot state handed to the decision function each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub pose: RobotPose,
    pub velocity: RobotVelocity,
    /// Body radius in metres.
    pub radius: f64,
    pub goal_x: f64,
    pub goal_y: f64,
    /// Preferred cruising speed in m/s.
    pub v_pref: f64,
}

impl RobotState {
    pub fn goal(&self) -> Point2<f64> {
        Point2::new(self.goal_x, self.goal_y)
    }
}

/// A single obstacle as seen by the decision function.
///
/// Obstacles are treated as instantaneously static, so the velocity is always
/// zero when built by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleObservation {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
}

impl ObstacleObservation {
    /// A motionless obstacle at `(x, y)`.
    pub fn stationary(x: f64, y: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            radius,
        }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Static-agent record seeded alongside each obstacle for simulation
/// bookkeeping: position, goal, velocity and heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub px: f64,
    pub py: f64,
    pub gx: f64,
    pub gy: f64,
    pub vx: f64,
    pub vy: f64,
    pub theta: f64,
}

impl AgentSeed {
    /// An agent parked at `(x, y)` whose goal is its own position.
    pub fn parked(x: f64, y: f64) -> Self {
        Self {
            px: x,
            py: y,
            gx: x,
            gy: y,
            vx: 0.0,
            vy: 0.0,
            theta: 0.0,
        }
    }
}

/// One reading from the perception source.
///
/// The sentinel is a separate variant so a cycle either carries a complete
/// frame or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerceptionSnapshot {
    /// Obstacle points in the sensor frame plus the robot pose estimate.
    Frame {
        points: Vec<Point2<f64>>,
        pose: RobotPose,
    },
    /// The sensor link is down; nothing was read.
    NotConnected,
}

impl PerceptionSnapshot {
    pub fn is_connected(&self) -> bool {
        !matches!(self, PerceptionSnapshot::NotConnected)
    }
}

/// Output of the decision function.
///
/// `(vx, vy)` is the chosen velocity; `(next_x, next_y)` is where the robot
/// would be one control period later if it followed it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionIntent {
    pub vx: f64,
    pub vy: f64,
    pub next_x: f64,
    pub next_y: f64,
}

impl MotionIntent {
    /// Build an intent from a velocity, integrating `pose` over `time_step`
    /// to obtain the next target position.
    pub fn from_velocity(pose: &RobotPose, vx: f64, vy: f64, time_step: f64) -> Self {
        Self {
            vx,
            vy,
            next_x: pose.x + vx * time_step,
            next_y: pose.y + vy * time_step,
        }
    }

    pub fn velocity(&self) -> RobotVelocity {
        RobotVelocity::new(self.vx, self.vy)
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite()
            && self.vy.is_finite()
            && self.next_x.is_finite()
            && self.next_y.is_finite()
    }
}

/// Discrete instruction understood by the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl DriveCommand {
    pub const ALL: [DriveCommand; 5] = [
        DriveCommand::Forward,
        DriveCommand::Backward,
        DriveCommand::TurnLeft,
        DriveCommand::TurnRight,
        DriveCommand::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriveCommand::Forward => "forward",
            DriveCommand::Backward => "backward",
            DriveCommand::TurnLeft => "turn_left",
            DriveCommand::TurnRight => "turn_right",
            DriveCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitudes passed to the actuator alongside every [`DriveCommand`], in
/// motor-controller units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveSpeeds {
    pub linear: f64,
    pub angular: f64,
}

impl DriveSpeeds {
    pub fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }
}

/// Global error type spanning decision failures, hardware faults and bad
/// configuration.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum NavError {
    #[error("Decision Function Failed: {0}")]
    Decision(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid Navigation State: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn heading_forward_at_zero_yaw_points_along_y() {
        let v = RobotPose::new(3.0, -1.0, 0.0).heading_forward();
        assert_relative_eq!(v.vx, 0.0);
        assert_relative_eq!(v.vy, 1.0);
    }

    #[test]
    fn heading_forward_is_unit_length() {
        for yaw in [-2.5, -0.7, 0.3, 1.2, 3.1] {
            let v = RobotPose::new(0.0, 0.0, yaw).heading_forward();
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn intent_from_velocity_integrates_position() {
        let pose = RobotPose::new(1.0, 2.0, 0.0);
        let intent = MotionIntent::from_velocity(&pose, 0.5, -1.0, 0.25);
        assert_relative_eq!(intent.next_x, 1.125);
        assert_relative_eq!(intent.next_y, 1.75);
    }

    #[test]
    fn not_connected_is_not_connected() {
        assert!(!PerceptionSnapshot::NotConnected.is_connected());
        let frame = PerceptionSnapshot::Frame {
            points: vec![],
            pose: RobotPose::default(),
        };
        assert!(frame.is_connected());
    }

    #[test]
    fn drive_command_serialises_snake_case() {
        let json = serde_json::to_string(&DriveCommand::TurnLeft).unwrap();
        assert_eq!(json, "\"turn_left\"");
        assert_eq!(DriveCommand::TurnRight.to_string(), "turn_right");
    }

    #[test]
    fn agent_seed_parked_goal_is_position() {
        let seed = AgentSeed::parked(4.0, 5.0);
        assert_eq!((seed.gx, seed.gy), (4.0, 5.0));
        assert_eq!((seed.vx, seed.vy), (0.0, 0.0));
    }

    #[test]
    fn nav_error_display() {
        let err = NavError::HardwareFault {
            component: "drive_base".to_string(),
            details: "overcurrent".to_string(),
        };
        assert!(err.to_string().contains("drive_base"));
        assert!(NavError::Decision("nan".into())
            .to_string()
            .contains("Decision Function Failed"));
    }
}
