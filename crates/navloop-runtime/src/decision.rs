//! [`DecisionAdapter`] – the seam between the control loop and the
//! navigation decision function.
//!
//! The decision function is a black box mapping robot state and obstacles to
//! a [`MotionIntent`].  Any implementation (a reciprocal collision-avoidance
//! solver, a learned policy, a test closure) plugs in through the
//! [`DecisionPolicy`] trait; the control loop only ever sees the adapter.
//!
//! Two classical variants ship with the crate and are selectable by name via
//! [`builtin_policy`]:
//!
//! | Name | Behaviour |
//! |---|---|
//! | `goal_seek` | [`GoalSeekPolicy`]: heads for the goal at the preferred speed, deflected away from obstacles inside a safety margin. |
//! | `hold` | [`HoldPolicy`]: keeps driving along the current heading. |

use navloop_types::{MotionIntent, NavError, ObstacleObservation, RobotState};
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// DecisionPolicy
// ─────────────────────────────────────────────────────────────────────────────

/// A navigation decision function.
pub trait DecisionPolicy: Send {
    /// Short identifier used in logs and configuration, e.g. `"goal_seek"`.
    fn name(&self) -> &str;

    /// Choose the robot's next motion.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the control loop: acting on an undefined
    /// decision is not an option.
    fn decide(
        &mut self,
        robot: &RobotState,
        obstacles: &[ObstacleObservation],
    ) -> Result<MotionIntent, NavError>;
}

/// Wraps a closure as a [`DecisionPolicy`].
pub struct FnPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnPolicy<F>
where
    F: FnMut(&RobotState, &[ObstacleObservation]) -> Result<MotionIntent, NavError> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> DecisionPolicy for FnPolicy<F>
where
    F: FnMut(&RobotState, &[ObstacleObservation]) -> Result<MotionIntent, NavError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(
        &mut self,
        robot: &RobotState,
        obstacles: &[ObstacleObservation],
    ) -> Result<MotionIntent, NavError> {
        (self.f)(robot, obstacles)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DecisionAdapter
// ─────────────────────────────────────────────────────────────────────────────

/// Packages the cycle's state, invokes the bound [`DecisionPolicy`] and hands
/// back its intent unchanged.
pub struct DecisionAdapter {
    policy: Box<dyn DecisionPolicy>,
}

impl DecisionAdapter {
    pub fn new(policy: Box<dyn DecisionPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Invoke the decision function.
    ///
    /// # Errors
    ///
    /// - [`NavError::InvalidState`] if the robot state is not finite or the
    ///   obstacle set is empty.
    /// - [`NavError::Decision`] if the policy fails or returns a non-finite
    ///   intent.
    pub fn decide(
        &mut self,
        robot: &RobotState,
        obstacles: &[ObstacleObservation],
    ) -> Result<MotionIntent, NavError> {
        if !robot.pose.is_finite() || !robot.velocity.vx.is_finite() || !robot.velocity.vy.is_finite()
        {
            return Err(NavError::InvalidState(format!(
                "non-finite robot state: {robot:?}"
            )));
        }
        if obstacles.is_empty() {
            return Err(NavError::InvalidState(
                "decision function requires at least one obstacle".to_string(),
            ));
        }

        let intent = self.policy.decide(robot, obstacles)?;
        if !intent.is_finite() {
            return Err(NavError::Decision(format!(
                "policy '{}' returned a non-finite intent: {intent:?}",
                self.policy.name()
            )));
        }
        trace!(policy = self.policy.name(), vx = intent.vx, vy = intent.vy, "decision made");
        Ok(intent)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in policies
// ─────────────────────────────────────────────────────────────────────────────

/// Build one of the built-in policies by name.
///
/// # Errors
///
/// Returns [`NavError::Config`] for an unknown name.
pub fn builtin_policy(name: &str, time_step: f64) -> Result<Box<dyn DecisionPolicy>, NavError> {
    match name {
        "goal_seek" => Ok(Box::new(GoalSeekPolicy::new(time_step))),
        "hold" => Ok(Box::new(HoldPolicy::new(time_step))),
        other => Err(NavError::Config(format!(
            "unknown policy '{other}' (expected 'goal_seek' or 'hold')"
        ))),
    }
}

/// Heads straight for the goal, pushed sideways by nearby obstacles.
#[derive(Debug, Clone)]
pub struct GoalSeekPolicy {
    time_step: f64,
    /// Clearance (metres, surface to surface) under which obstacles repel.
    safety_margin: f64,
    /// Weight of the repulsive term relative to the unit goal direction.
    repulsion_gain: f64,
}

impl GoalSeekPolicy {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            safety_margin: 1.0,
            repulsion_gain: 1.5,
        }
    }
}

impl DecisionPolicy for GoalSeekPolicy {
    fn name(&self) -> &str {
        "goal_seek"
    }

    fn decide(
        &mut self,
        robot: &RobotState,
        obstacles: &[ObstacleObservation],
    ) -> Result<MotionIntent, NavError> {
        let position = robot.pose.position();
        let to_goal = robot.goal() - position;
        let distance = to_goal.norm();
        if distance < 1e-6 {
            return Ok(MotionIntent::from_velocity(&robot.pose, 0.0, 0.0, self.time_step));
        }

        let mut direction = to_goal / distance;
        for obstacle in obstacles {
            let away = position - obstacle.position();
            let centre_distance = away.norm();
            let clearance = centre_distance - obstacle.radius - robot.radius;
            if centre_distance > 1e-9 && clearance < self.safety_margin {
                let weight = (self.safety_margin - clearance.max(0.0)) / self.safety_margin;
                direction += away / centre_distance * weight * self.repulsion_gain;
            }
        }

        let norm = direction.norm();
        if norm < 1e-9 {
            return Ok(MotionIntent::from_velocity(&robot.pose, 0.0, 0.0, self.time_step));
        }
        // Never overshoot the goal within one step.
        let speed = robot.v_pref.min(distance / self.time_step);
        let velocity = direction / norm * speed;
        Ok(MotionIntent::from_velocity(
            &robot.pose,
            velocity.x,
            velocity.y,
            self.time_step,
        ))
    }
}

/// Keeps moving along the robot's current heading at the preferred speed.
#[derive(Debug, Clone)]
pub struct HoldPolicy {
    time_step: f64,
}

impl HoldPolicy {
    pub fn new(time_step: f64) -> Self {
        Self { time_step }
    }
}

impl DecisionPolicy for HoldPolicy {
    fn name(&self) -> &str {
        "hold"
    }

    fn decide(
        &mut self,
        robot: &RobotState,
        _obstacles: &[ObstacleObservation],
    ) -> Result<MotionIntent, NavError> {
        let forward = robot.pose.heading_forward();
        Ok(MotionIntent::from_velocity(
            &robot.pose,
            forward.vx * robot.v_pref,
            forward.vy * robot.v_pref,
            self.time_step,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
