//! `navloop-hal` – hardware seams for the navigation loop.
//!
//! The control loop never talks to a sensor or motor controller directly; it
//! holds trait objects handed to it at construction so drivers can be swapped
//! (or replaced with test doubles) without touching control logic.
//!
//! # Modules
//!
//! - [`perception`] – [`PerceptionSource`][perception::PerceptionSource]:
//!   yields one [`PerceptionSnapshot`][navloop_types::PerceptionSnapshot] per
//!   poll.
//! - [`actuator`] – [`DriveActuator`][actuator::DriveActuator]: fire-and-forget
//!   sink for discrete drive commands, plus
//!   [`ActuatorGuard`][actuator::ActuatorGuard] which guarantees a final
//!   `Stop` when it goes out of scope.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: an in-process kinematic robot with
//!   a simulated lidar and drive base for headless runs and CI.

pub mod actuator;
pub mod perception;
pub mod sim;

pub use actuator::{ActuatorGuard, DriveActuator};
pub use perception::PerceptionSource;
