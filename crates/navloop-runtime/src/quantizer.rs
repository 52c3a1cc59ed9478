//! [`HeadingQuantizer`] – continuous motion intent → one discrete
//! [`DriveCommand`].
//!
//! The angle between the robot's heading and the intended velocity is
//! computed as
//!
//! ```text
//! diff_angle = yaw + atan2(vx, vy)
//! ```
//!
//! with the arguments of `atan2` deliberately in `(vx, vy)` order: the robot
//! faces world `+y` at zero yaw, so the heading-forward vector
//! `(-sin yaw, cos yaw)` yields `atan2(vx, vy) == -yaw` and therefore a zero
//! difference.  A negative difference means the intent points
//! counter-clockwise of the heading (turn left), a positive one clockwise
//! (turn right).
//!
//! Thresholds are strict: an angle exactly on a threshold drives forward.

use navloop_types::{DriveCommand, MotionIntent};

/// Below this difference angle (radians) the robot turns left.
pub const TURN_LEFT_THRESHOLD_RAD: f64 = -0.7;

/// Above this difference angle (radians) the robot turns right.
pub const TURN_RIGHT_THRESHOLD_RAD: f64 = 0.7;

/// A quantized decision together with the angle it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantized {
    pub command: DriveCommand,
    pub diff_angle: f64,
}

/// Maps a heading / intent pair to a [`DriveCommand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingQuantizer {
    left_threshold: f64,
    right_threshold: f64,
}

impl Default for HeadingQuantizer {
    fn default() -> Self {
        Self::new(TURN_LEFT_THRESHOLD_RAD, TURN_RIGHT_THRESHOLD_RAD)
    }
}

impl HeadingQuantizer {
    /// `left_threshold` must be below `right_threshold`; configuration
    /// validation enforces this before a quantizer is built.
    pub fn new(left_threshold: f64, right_threshold: f64) -> Self {
        Self {
            left_threshold,
            right_threshold,
        }
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.left_threshold, self.right_threshold)
    }

    /// Signed angle between the robot heading and the intended velocity.
    pub fn diff_angle(yaw: f64, intent: &MotionIntent) -> f64 {
        yaw + intent.vx.atan2(intent.vy)
    }

    /// Select the command for a precomputed difference angle.
    ///
    /// Only `TurnLeft`, `TurnRight` and `Forward` are ever selected here.
    pub fn command_for(&self, diff_angle: f64) -> DriveCommand {
        if diff_angle < self.left_threshold {
            DriveCommand::TurnLeft
        } else if diff_angle > self.right_threshold {
            DriveCommand::TurnRight
        } else {
            DriveCommand::Forward
        }
    }

    pub fn quantize(&self, yaw: f64, intent: &MotionIntent) -> Quantized {
        let diff_angle = Self::diff_angle(yaw, intent);
        Quantized {
            command: self.command_for(diff_angle),
            diff_angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use navloop_types::RobotPose;
    use std::f64::consts::FRAC_PI_2;

    fn intent(vx: f64, vy: f64) -> MotionIntent {
        MotionIntent {
            vx,
            vy,
            ..MotionIntent::default()
        }
    }

    #[test]
    fn left_threshold_is_strict() {
        let q = HeadingQuantizer::default();
        assert_eq!(q.command_for(-0.7), DriveCommand::Forward);
        assert_eq!(q.command_for(-0.71), DriveCommand::TurnLeft);
    }

    #[test]
    fn right_threshold_is_strict() {
        let q = HeadingQuantizer::default();
        assert_eq!(q.command_for(0.7), DriveCommand::Forward);
        assert_eq!(q.command_for(0.71), DriveCommand::TurnRight);
    }

    #[test]
    fn lateral_intent_at_zero_yaw_turns_right() {
        // vx = 1, vy = 0 at yaw 0: atan2(1, 0) = π/2 > 0.7.
        let q = HeadingQuantizer::default().quantize(0.0, &intent(1.0, 0.0));
        assert_relative_eq!(q.diff_angle, FRAC_PI_2);
        assert_eq!(q.command, DriveCommand::TurnRight);
    }

    #[test]
    fn intent_along_heading_drives_forward() {
        let q = HeadingQuantizer::default();
        for yaw in [-2.0, -0.5, 0.0, 0.4, 1.3] {
            let forward = RobotPose::new(0.0, 0.0, yaw).heading_forward();
            let out = q.quantize(yaw, &intent(forward.vx, forward.vy));
            assert_relative_eq!(out.diff_angle, 0.0, epsilon = 1e-12);
            assert_eq!(out.command, DriveCommand::Forward);
        }
    }

    #[test]
    fn counter_clockwise_intent_turns_left() {
        // Facing +y, wanting to go towards -x (a quarter turn to the left).
        let out = HeadingQuantizer::default().quantize(0.0, &intent(-1.0, 0.0));
        assert_relative_eq!(out.diff_angle, -FRAC_PI_2);
        assert_eq!(out.command, DriveCommand::TurnLeft);
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let q = HeadingQuantizer::new(-0.2, 0.2);
        assert_eq!(q.thresholds(), (-0.2, 0.2));
        assert_eq!(q.command_for(0.3), DriveCommand::TurnRight);
        assert_eq!(q.command_for(-0.3), DriveCommand::TurnLeft);
        assert_eq!(q.command_for(0.1), DriveCommand::Forward);
    }
}
