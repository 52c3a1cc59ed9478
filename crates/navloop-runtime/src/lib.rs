//! `navloop-runtime` – the reactive local-navigation control loop.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: polls
//!   perception, transforms and assembles obstacles, asks the decision
//!   function for an intent, quantizes it and dispatches one drive command
//!   per cycle until shut down.
//! - [`decision`] – [`DecisionPolicy`][decision::DecisionPolicy] capability
//!   trait, the pass-through [`DecisionAdapter`][decision::DecisionAdapter]
//!   and the built-in `goal_seek` / `hold` policies.
//! - [`quantizer`] – [`HeadingQuantizer`][quantizer::HeadingQuantizer]:
//!   heading difference → `Forward` / `TurnLeft` / `TurnRight`.
//! - [`link_monitor`] – [`LinkMonitor`][link_monitor::LinkMonitor]: sensor
//!   dropout diagnostics.
//! - [`observer`] – post-dispatch [`CycleObserver`][observer::CycleObserver]
//!   hooks, including an in-memory trajectory recorder.
//! - [`shutdown`] – [`ShutdownSignal`][shutdown::ShutdownSignal]: cooperative
//!   cancellation checked at the top of every cycle.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.

pub mod control_loop;
pub mod decision;
pub mod link_monitor;
pub mod observer;
pub mod quantizer;
pub mod shutdown;
pub mod telemetry;

pub use control_loop::{ControlLoop, ControlLoopConfig, CyclePipeline, LoopStats};
pub use decision::{
    DecisionAdapter, DecisionPolicy, FnPolicy, GoalSeekPolicy, HoldPolicy, builtin_policy,
};
pub use link_monitor::{LinkHealth, LinkMonitor};
pub use observer::{CycleObserver, CycleReport, TracingObserver, TrajectoryRecorder, TrajectorySample};
pub use quantizer::{
    HeadingQuantizer, Quantized, TURN_LEFT_THRESHOLD_RAD, TURN_RIGHT_THRESHOLD_RAD,
};
pub use shutdown::ShutdownSignal;
pub use telemetry::{TracerProviderGuard, init_tracing};
