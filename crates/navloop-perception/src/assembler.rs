//! [`ObstacleAssembler`] – builds the per-cycle obstacle set.
//!
//! Every world-frame point becomes one motionless
//! [`ObstacleObservation`] with a fixed radius.  A parallel list of
//! [`AgentSeed`]s (static agents parked on each obstacle) is produced for any
//! downstream simulation bookkeeping.
//!
//! # Empty input
//!
//! The decision function is only well defined with at least one obstacle, so
//! when perception reports nothing a single synthetic obstacle is injected
//! [`SYNTHETIC_OBSTACLE_OFFSET`] metres away from the robot on both axes.

use nalgebra::Point2;
use navloop_types::{AgentSeed, ObstacleObservation, RobotPose};
use tracing::trace;

/// Offset (metres, applied to both axes) of the synthetic obstacle injected
/// when perception reports no points.
pub const SYNTHETIC_OBSTACLE_OFFSET: f64 = 10.0;

/// Obstacle state for one cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledObstacles {
    pub observations: Vec<ObstacleObservation>,
    pub agent_seeds: Vec<AgentSeed>,
    synthetic: bool,
}

impl AssembledObstacles {
    /// `true` when the set holds only the injected far-away obstacle.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Converts world-frame points into decision-function obstacle state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleAssembler {
    radius: f64,
}

impl ObstacleAssembler {
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Derive the obstacle radius from the perception voxel size: each
    /// obstacle point stands for one occupied cell, so its radius is half the
    /// cell edge.
    pub fn from_cell_size(cell_size: f64) -> Self {
        Self::new(cell_size / 2.0)
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Build the obstacle set for a robot at `robot` from world-frame points.
    pub fn assemble(&self, robot: &RobotPose, world_points: &[Point2<f64>]) -> AssembledObstacles {
        if world_points.is_empty() {
            let x = robot.x + SYNTHETIC_OBSTACLE_OFFSET;
            let y = robot.y + SYNTHETIC_OBSTACLE_OFFSET;
            trace!(x, y, "no obstacles perceived; injecting synthetic obstacle");
            return AssembledObstacles {
                observations: vec![ObstacleObservation::stationary(x, y, self.radius)],
                agent_seeds: vec![AgentSeed::parked(x, y)],
                synthetic: true,
            };
        }

        let (observations, agent_seeds) = world_points
            .iter()
            .map(|p| {
                (
                    ObstacleObservation::stationary(p.x, p.y, self.radius),
                    AgentSeed::parked(p.x, p.y),
                )
            })
            .unzip();

        AssembledObstacles {
            observations,
            agent_seeds,
            synthetic: false,
        }
    }
}
