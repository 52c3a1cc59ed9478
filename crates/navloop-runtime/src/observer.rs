//! Post-dispatch observer hooks.
//!
//! Observers see a [`CycleReport`] after the drive command has been sent.
//! They cannot alter the decision and run outside the timed section of the
//! cycle, so plotting, recording or logging never affects control.

use std::sync::{Arc, Mutex};

use nalgebra::Point2;
use navloop_perception::AssembledObstacles;
use navloop_types::{DriveCommand, MotionIntent, RobotPose, RobotVelocity};
use serde::Serialize;
use tracing::debug;

/// Everything computed during one processed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based index of the processed cycle.
    pub cycle: u64,
    pub pose: RobotPose,
    /// Heading-forward velocity handed to the decision function.
    pub velocity: RobotVelocity,
    /// Perceived obstacle points after the world-frame transform.
    pub world_points: Vec<Point2<f64>>,
    pub obstacles: AssembledObstacles,
    pub intent: MotionIntent,
    pub diff_angle: f64,
    pub command: DriveCommand,
}

/// Hook invoked once per processed cycle, after dispatch.
pub trait CycleObserver: Send {
    fn on_cycle(&mut self, report: &CycleReport);
}

/// Logs each cycle at `debug` level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl CycleObserver for TracingObserver {
    fn on_cycle(&mut self, report: &CycleReport) {
        debug!(
            cycle = report.cycle,
            x = report.pose.x,
            y = report.pose.y,
            yaw = report.pose.yaw,
            obstacles = report.obstacles.len(),
            synthetic = report.obstacles.is_synthetic(),
            vx = report.intent.vx,
            vy = report.intent.vy,
            diff_angle = report.diff_angle,
            command = %report.command,
            "cycle complete"
        );
    }
}

/// One recorded point of the robot's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub cycle: u64,
    pub pose: RobotPose,
    pub intent: MotionIntent,
    pub obstacles: Vec<Point2<f64>>,
    pub command: DriveCommand,
}

/// Records the robot trajectory and perceived obstacles in memory for later
/// rendering.  Clones share the same buffer, so keep one clone outside the
/// loop to read the samples back.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryRecorder {
    samples: Arc<Mutex<Vec<TrajectorySample>>>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all samples recorded so far, oldest first.
    pub fn samples(&self) -> Vec<TrajectorySample> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CycleObserver for TrajectoryRecorder {
    fn on_cycle(&mut self, report: &CycleReport) {
        let sample = TrajectorySample {
            cycle: report.cycle,
            pose: report.pose,
            intent: report.intent,
            obstacles: report.world_points.clone(),
            command: report.command,
        };
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sample);
    }
}
