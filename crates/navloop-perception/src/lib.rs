//! `navloop-perception` – turns a raw perception snapshot into the obstacle
//! state the decision function consumes.
//!
//! # Modules
//!
//! - [`transform`] – [`FrameTransform`][transform::FrameTransform]: rigid 2-D
//!   transform from the robot-relative sensor frame into the world frame,
//!   built from the robot's current pose.
//! - [`assembler`] – [`ObstacleAssembler`][assembler::ObstacleAssembler]:
//!   converts world-frame points into
//!   [`ObstacleObservation`][navloop_types::ObstacleObservation]s and injects
//!   a far-away synthetic obstacle when nothing was detected.

pub mod assembler;
pub mod transform;

pub use assembler::{AssembledObstacles, ObstacleAssembler, SYNTHETIC_OBSTACLE_OFFSET};
pub use transform::{FrameTransform, to_world_frame};
