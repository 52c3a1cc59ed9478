//! Sensor-frame → world-frame transform.
//!
//! The perception source reports obstacle points relative to the robot.  To
//! express them in the world frame each point is rotated by the robot's yaw
//! and then translated by the robot's world-frame position:
//!
//! ```text
//! p_world = R(yaw) · p_sensor + (x, y)
//! ```
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point2;
//! use navloop_perception::transform::to_world_frame;
//! use navloop_types::RobotPose;
//!
//! // Robot at (1, 2) turned a quarter turn counter-clockwise.
//! let pose = RobotPose::new(1.0, 2.0, std::f64::consts::FRAC_PI_2);
//! let world = to_world_frame(&pose, &[Point2::new(1.0, 0.0)]);
//! assert!((world[0].x - 1.0).abs() < 1e-9);
//! assert!((world[0].y - 3.0).abs() < 1e-9);
//! ```

use nalgebra::{Matrix2, Matrix2xX, Point2, Rotation2, Vector2};
use navloop_types::RobotPose;

// ────────────────────────────────────────────────────────────────────────────
// FrameTransform
// ────────────────────────────────────────────────────────────────────────────

/// A planar rigid-body transform: rotation by `yaw` followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    rotation: Rotation2<f64>,
    translation: Vector2<f64>,
}

impl FrameTransform {
    /// Build the sensor → world transform for a robot at `pose`.
    pub fn from_pose(pose: &RobotPose) -> Self {
        Self {
            rotation: Rotation2::new(pose.yaw),
            translation: Vector2::new(pose.x, pose.y),
        }
    }

    /// The 2×2 rotation matrix `[[cos, -sin], [sin, cos]]`.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        *self.rotation.matrix()
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    /// Transform a single sensor-frame point into the world frame.
    pub fn apply(&self, point: &Point2<f64>) -> Point2<f64> {
        self.rotation * *point + self.translation
    }

    /// Transform a batch of sensor-frame points.
    ///
    /// The points are packed as the columns of a `2 × N` matrix and rotated
    /// with one matrix product before the translation is added column-wise.
    pub fn apply_all(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        if points.is_empty() {
            return Vec::new();
        }
        let packed =
            Matrix2xX::from_iterator(points.len(), points.iter().flat_map(|p| [p.x, p.y]));
        let rotated = self.rotation.matrix() * packed;
        rotated
            .column_iter()
            .map(|col| Point2::new(col[0], col[1]) + self.translation)
            .collect()
    }

    /// Map a world-frame point back into the sensor frame.
    pub fn inverse_apply(&self, point: &Point2<f64>) -> Point2<f64> {
        self.rotation.inverse() * (*point - self.translation)
    }
}

/// Transform sensor-frame `points` into the world frame for a robot at `pose`.
///
/// An empty input yields an empty output and a single point skips the bulk
/// path; both paths produce identical numbers.
pub fn to_world_frame(pose: &RobotPose, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let tf = FrameTransform::from_pose(pose);
    match points {
        [] => Vec::new(),
        [single] => vec![tf.apply(single)],
        _ => tf.apply_all(points),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
