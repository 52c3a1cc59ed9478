//! [`ControlLoop`] – the perception → decision → actuation cycle.
//!
//! Each cycle:
//!
//! 1. **Acquire** – poll the [`PerceptionSource`].  A `NotConnected` snapshot
//!    skips straight back to polling: nothing is processed, nothing is
//!    dispatched and the cycle is not counted.
//! 2. **Transform** – move the obstacle points from the sensor frame into the
//!    world frame using the reported pose.
//! 3. **Assemble** – build the obstacle set, injecting a far-away synthetic
//!    obstacle when nothing was perceived.
//! 4. **Decide** – hand robot and obstacle state to the
//!    [`DecisionAdapter`].  A failure here ends the run.
//! 5. **Quantize** – reduce the intent to one [`DriveCommand`].
//! 6. **Dispatch** – send the command to the actuator.
//!
//! Observers run after dispatch and outside the timed section.
//!
//! The loop has no success or failure exit of its own: it runs until the
//! [`ShutdownSignal`] is triggered or the decision function fails.  The
//! actuator is held through an [`ActuatorGuard`] for the whole run, so the
//! robot is sent `Stop` on every way out.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point2;
//! use navloop_hal::sim::{SimWorld, SimWorldConfig};
//! use navloop_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//! use navloop_runtime::decision::HoldPolicy;
//! use navloop_runtime::shutdown::ShutdownSignal;
//! use navloop_types::RobotPose;
//!
//! let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default())
//!     .with_obstacle(Point2::new(3.0, 3.0));
//! let mut control = ControlLoop::new(
//!     ControlLoopConfig::default(),
//!     Box::new(world.lidar()),
//!     Box::new(HoldPolicy::new(0.25)),
//!     Box::new(world.drive_base()),
//! );
//!
//! let shutdown = ShutdownSignal::new();
//! shutdown.trigger();
//! let stats = control.run(&shutdown).unwrap();
//! assert_eq!(stats.cycles, 0);
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nalgebra::Point2;
use navloop_hal::{ActuatorGuard, DriveActuator, PerceptionSource};
use navloop_perception::{ObstacleAssembler, to_world_frame};
use navloop_types::{DriveSpeeds, NavError, PerceptionSnapshot, RobotPose, RobotState};
use serde::Serialize;
use tracing::{debug, debug_span, error, info, trace};

use crate::decision::{DecisionAdapter, DecisionPolicy};
use crate::link_monitor::LinkMonitor;
use crate::observer::{CycleObserver, CycleReport};
use crate::quantizer::{HeadingQuantizer, TURN_LEFT_THRESHOLD_RAD, TURN_RIGHT_THRESHOLD_RAD};
use crate::shutdown::ShutdownSignal;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Startup parameters for [`ControlLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopConfig {
    /// Robot body radius in metres.
    pub robot_radius: f64,
    pub goal_x: f64,
    pub goal_y: f64,
    /// Preferred speed handed to the decision function (m/s).
    pub v_pref: f64,
    /// Control period assumed by the decision function (s).
    pub time_step: f64,
    /// Perception voxel edge; obstacle radius is half of it.
    pub voxel_size: f64,
    /// Magnitudes sent with every drive command.
    pub speeds: DriveSpeeds,
    pub turn_left_threshold: f64,
    pub turn_right_threshold: f64,
    /// How long the sensor link may stay down before a warning is logged.
    pub link_warn_after: Duration,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            robot_radius: 0.3,
            goal_x: 0.0,
            goal_y: 4.0,
            v_pref: 1.0,
            time_step: 0.25,
            voxel_size: 0.45,
            speeds: DriveSpeeds::new(10.0, 5.0),
            turn_left_threshold: TURN_LEFT_THRESHOLD_RAD,
            turn_right_threshold: TURN_RIGHT_THRESHOLD_RAD,
            link_warn_after: Duration::from_secs(2),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Timing statistics for one run.  Purely diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct LoopStats {
    /// Processed (connected) cycles.
    pub cycles: u64,
    /// `NotConnected` polls, not counted as cycles.
    pub dropped_polls: u64,
    /// Wall-clock time spent in process + dispatch across all cycles.
    pub total_processing: Duration,
    pub started_at: DateTime<Utc>,
}

impl LoopStats {
    fn new() -> Self {
        Self {
            cycles: 0,
            dropped_polls: 0,
            total_processing: Duration::ZERO,
            started_at: Utc::now(),
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.cycles += 1;
        self.total_processing += elapsed;
    }

    /// Mean process + dispatch time per cycle, or `None` before the first
    /// processed cycle.
    pub fn average_latency(&self) -> Option<Duration> {
        if self.cycles == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.total_processing.as_secs_f64() / self.cycles as f64,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CyclePipeline
// ─────────────────────────────────────────────────────────────────────────────

/// The pure processing half of a cycle: transform → assemble → decide →
/// quantize.
pub struct CyclePipeline {
    assembler: ObstacleAssembler,
    decision: DecisionAdapter,
    quantizer: HeadingQuantizer,
    robot_radius: f64,
    goal: Point2<f64>,
    v_pref: f64,
}

impl CyclePipeline {
    pub fn new(config: &ControlLoopConfig, policy: Box<dyn DecisionPolicy>) -> Self {
        Self {
            assembler: ObstacleAssembler::from_cell_size(config.voxel_size),
            decision: DecisionAdapter::new(policy),
            quantizer: HeadingQuantizer::new(
                config.turn_left_threshold,
                config.turn_right_threshold,
            ),
            robot_radius: config.robot_radius,
            goal: Point2::new(config.goal_x, config.goal_y),
            v_pref: config.v_pref,
        }
    }

    pub fn policy_name(&self) -> &str {
        self.decision.policy_name()
    }

    /// Run one cycle's processing on a connected snapshot.
    ///
    /// # Errors
    ///
    /// Propagates any [`DecisionAdapter::decide`] failure.
    pub fn process(
        &mut self,
        cycle: u64,
        pose: RobotPose,
        sensor_points: &[Point2<f64>],
    ) -> Result<CycleReport, NavError> {
        let world_points = to_world_frame(&pose, sensor_points);
        let obstacles = self.assembler.assemble(&pose, &world_points);

        let velocity = pose.heading_forward();
        let robot = RobotState {
            pose,
            velocity,
            radius: self.robot_radius,
            goal_x: self.goal.x,
            goal_y: self.goal.y,
            v_pref: self.v_pref,
        };
        let intent = self.decision.decide(&robot, &obstacles.observations)?;
        let quantized = self.quantizer.quantize(pose.yaw, &intent);

        Ok(CycleReport {
            cycle,
            pose,
            velocity,
            world_points,
            obstacles,
            intent,
            diff_angle: quantized.diff_angle,
            command: quantized.command,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the perception source, decision function and actuator for a run.
pub struct ControlLoop {
    config: ControlLoopConfig,
    source: Box<dyn PerceptionSource>,
    actuator: Box<dyn DriveActuator>,
    pipeline: CyclePipeline,
    link: LinkMonitor,
    observers: Vec<Box<dyn CycleObserver>>,
    /// Pose from the previous processed cycle, kept for the speed diagnostic.
    last_pose: Option<RobotPose>,
}

impl ControlLoop {
    pub fn new(
        config: ControlLoopConfig,
        source: Box<dyn PerceptionSource>,
        policy: Box<dyn DecisionPolicy>,
        actuator: Box<dyn DriveActuator>,
    ) -> Self {
        let pipeline = CyclePipeline::new(&config, policy);
        let link = LinkMonitor::new(config.link_warn_after);
        Self {
            config,
            source,
            actuator,
            pipeline,
            link,
            observers: Vec::new(),
            last_pose: None,
        }
    }

    /// Attach an observer that is called after every dispatch.
    pub fn with_observer(mut self, observer: Box<dyn CycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &ControlLoopConfig {
        &self.config
    }

    /// Run cycles until `shutdown` is triggered or the decision function
    /// fails.
    ///
    /// The signal is checked before every poll, including after a
    /// `NotConnected` snapshot.  `Stop` is dispatched to the actuator before
    /// this method returns, whichever way it returns.
    ///
    /// # Errors
    ///
    /// Returns the first decision failure; the loop does not try to recover.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> Result<LoopStats, NavError> {
        let mut stats = LoopStats::new();
        let speeds = self.config.speeds;
        let time_step = self.config.time_step;

        info!(
            source = self.source.id(),
            actuator = self.actuator.id(),
            policy = self.pipeline.policy_name(),
            "control loop starting"
        );
        let mut drive = ActuatorGuard::new(self.actuator.as_mut(), speeds);

        loop {
            if shutdown.is_triggered() {
                info!(cycles = stats.cycles, "shutdown requested; leaving control loop");
                break;
            }

            let acquire_start = Instant::now();
            let (points, pose) = match self.source.read() {
                PerceptionSnapshot::NotConnected => {
                    debug!("perception not connected; retrying");
                    stats.dropped_polls += 1;
                    self.link.record_dropout();
                    continue;
                }
                PerceptionSnapshot::Frame { points, pose } => (points, pose),
            };
            self.link.record_frame();
            let acquire_time = acquire_start.elapsed();

            let cycle = stats.cycles + 1;
            let span = debug_span!("cycle", cycle).entered();

            let process_start = Instant::now();
            let report = match self.pipeline.process(cycle, pose, &points) {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "decision function failed; stopping robot");
                    return Err(e);
                }
            };
            drive.send(report.command);
            let process_time = process_start.elapsed();
            stats.record(process_time);

            trace!(
                acquire_us = acquire_time.as_micros() as u64,
                process_us = process_time.as_micros() as u64,
                "cycle timing"
            );
            if let Some(previous) = self.last_pose {
                debug!(speed = previous.distance_to(&pose) / time_step, "speed");
            }
            self.last_pose = Some(pose);

            for observer in &mut self.observers {
                observer.on_cycle(&report);
            }
            drop(span);
        }

        Ok(stats)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{FnPolicy, HoldPolicy};
    use crate::observer::TrajectoryRecorder;
    use approx::assert_relative_eq;
    use navloop_hal::sim::{SimWorld, SimWorldConfig};
    use navloop_types::{DriveCommand, MotionIntent};
    use std::collections::VecDeque;

    /// Plays back a fixed script of snapshots, then triggers shutdown.
    struct ScriptedSource {
        script: VecDeque<PerceptionSnapshot>,
        shutdown: ShutdownSignal,
    }

    impl ScriptedSource {
        fn new(script: Vec<PerceptionSnapshot>, shutdown: &ShutdownSignal) -> Self {
            Self {
                script: script.into(),
                shutdown: shutdown.clone(),
            }
        }
    }

    impl PerceptionSource for ScriptedSource {
        fn id(&self) -> &str {
            "scripted"
        }

        fn read(&mut self) -> PerceptionSnapshot {
            let next = self.script.pop_front();
            if self.script.is_empty() {
                self.shutdown.trigger();
            }
            next.unwrap_or(PerceptionSnapshot::NotConnected)
        }
    }

    fn frame(points: Vec<Point2<f64>>, pose: RobotPose) -> PerceptionSnapshot {
        PerceptionSnapshot::Frame { points, pose }
    }

    #[test]
    fn pipeline_injects_synthetic_obstacle_for_empty_frame() {
        let mut pipeline = CyclePipeline::new(
            &ControlLoopConfig::default(),
            Box::new(HoldPolicy::new(0.25)),
        );
        let report = pipeline.process(1, RobotPose::new(1.0, 2.0, 0.0), &[]).unwrap();
        assert!(report.world_points.is_empty());
        assert!(report.obstacles.is_synthetic());
        assert_relative_eq!(report.obstacles.observations[0].x, 11.0);
        assert_relative_eq!(report.obstacles.observations[0].y, 12.0);
        assert_eq!(report.command, DriveCommand::Forward);
    }

    #[test]
    fn pipeline_uses_configured_thresholds() {
        let config = ControlLoopConfig {
            turn_left_threshold: -2.0,
            turn_right_threshold: 2.0,
            ..ControlLoopConfig::default()
        };
        let mut pipeline = CyclePipeline::new(
            &config,
            Box::new(FnPolicy::new("sideways", |_, _| {
                Ok(MotionIntent {
                    vx: 1.0,
                    vy: 0.0,
                    ..MotionIntent::default()
                })
            })),
        );
        let report = pipeline.process(1, RobotPose::default(), &[]).unwrap();
        // π/2 is inside the widened dead band.
        assert_eq!(report.command, DriveCommand::Forward);
    }

    #[test]
    fn counts_only_connected_cycles() {
        let shutdown = ShutdownSignal::new();
        let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default());
        let source = ScriptedSource::new(
            vec![
                PerceptionSnapshot::NotConnected,
                frame(vec![], RobotPose::default()),
                PerceptionSnapshot::NotConnected,
                frame(vec![Point2::new(1.0, 0.0)], RobotPose::default()),
            ],
            &shutdown,
        );
        let mut control = ControlLoop::new(
            ControlLoopConfig::default(),
            Box::new(source),
            Box::new(HoldPolicy::new(0.25)),
            Box::new(world.drive_base()),
        );

        let stats = control.run(&shutdown).unwrap();
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.dropped_polls, 2);
        assert!(stats.average_latency().is_some());
        // Two processed cycles plus the final stop.
        assert_eq!(
            world.commands(),
            vec![DriveCommand::Forward, DriveCommand::Forward, DriveCommand::Stop]
        );
    }

    #[test]
    fn decision_failure_stops_robot_and_propagates() {
        let shutdown = ShutdownSignal::new();
        let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default());
        let source = ScriptedSource::new(
            vec![
                frame(vec![], RobotPose::default()),
                frame(vec![], RobotPose::default()),
                frame(vec![], RobotPose::default()),
            ],
            &shutdown,
        );
        let mut calls = 0;
        let policy = FnPolicy::new("flaky", move |robot: &RobotState, _: &[_]| {
            calls += 1;
            if calls == 2 {
                return Err(NavError::Decision("policy crashed".to_string()));
            }
            let forward = robot.pose.heading_forward();
            Ok(MotionIntent::from_velocity(&robot.pose, forward.vx, forward.vy, 0.25))
        });
        let mut control = ControlLoop::new(
            ControlLoopConfig::default(),
            Box::new(source),
            Box::new(policy),
            Box::new(world.drive_base()),
        );

        let err = control.run(&shutdown).unwrap_err();
        assert!(matches!(err, NavError::Decision(_)));
        assert_eq!(world.commands(), vec![DriveCommand::Forward, DriveCommand::Stop]);
    }

    #[test]
    fn observers_see_every_processed_cycle() {
        let shutdown = ShutdownSignal::new();
        let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default());
        let source = ScriptedSource::new(
            vec![
                frame(vec![Point2::new(0.0, 2.0)], RobotPose::default()),
                PerceptionSnapshot::NotConnected,
                frame(vec![], RobotPose::new(0.0, 0.5, 0.0)),
            ],
            &shutdown,
        );
        let recorder = TrajectoryRecorder::new();
        let mut control = ControlLoop::new(
            ControlLoopConfig::default(),
            Box::new(source),
            Box::new(HoldPolicy::new(0.25)),
            Box::new(world.drive_base()),
        )
        .with_observer(Box::new(recorder.clone()));

        control.run(&shutdown).unwrap();
        let samples = recorder.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].cycle, 1);
        assert_eq!(samples[0].obstacles, vec![Point2::new(0.0, 2.0)]);
        assert_eq!(samples[1].cycle, 2);
        assert!(samples[1].obstacles.is_empty());
    }

    #[test]
    fn closed_loop_in_sim_reaches_towards_goal() {
        let shutdown = ShutdownSignal::new();
        let world = SimWorld::new(SimWorldConfig::default(), RobotPose::default());

        /// Stops the run after a fixed number of processed cycles.
        struct StopAfter {
            remaining: u64,
            shutdown: ShutdownSignal,
        }
        impl CycleObserver for StopAfter {
            fn on_cycle(&mut self, _report: &CycleReport) {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.shutdown.trigger();
                }
            }
        }

        let mut control = ControlLoop::new(
            ControlLoopConfig::default(),
            Box::new(world.lidar()),
            Box::new(crate::decision::GoalSeekPolicy::new(0.25)),
            Box::new(world.drive_base()),
        )
        .with_observer(Box::new(StopAfter {
            remaining: 10,
            shutdown: shutdown.clone(),
        }));

        let stats = control.run(&shutdown).unwrap();
        assert_eq!(stats.cycles, 10);
        // Goal is straight ahead, so the robot only ever drives forward.
        assert!(world.pose().y > 0.0);
        assert_eq!(world.commands().last(), Some(&DriveCommand::Stop));
    }
}
