//! Generic `DriveActuator` trait for the motor controller, and the scoped
//! [`ActuatorGuard`] that owns it for the lifetime of a control run.

use navloop_types::{DriveCommand, DriveSpeeds};
use tracing::{debug, info};

/// A motor controller that executes discrete drive commands.
///
/// Dispatch is fire-and-forget and must be safe to call every cycle, even
/// when the command is unchanged since the previous call: each call is an
/// independent instruction.
pub trait DriveActuator: Send {
    /// Stable identifier for this actuator, e.g. `"drive_base"`.
    fn id(&self) -> &str;

    /// Execute `command` using the given linear / angular magnitudes.
    fn dispatch(&mut self, command: DriveCommand, speeds: DriveSpeeds);
}

/// Exclusive, scoped access to a [`DriveActuator`].
///
/// Dispatches [`DriveCommand::Stop`] when dropped, so every exit path out of
/// the scope that holds the guard (normal return, `?` propagation, panic
/// unwind) leaves the robot stopped.
pub struct ActuatorGuard<'a> {
    actuator: &'a mut dyn DriveActuator,
    speeds: DriveSpeeds,
    dispatched: u64,
}

impl<'a> ActuatorGuard<'a> {
    pub fn new(actuator: &'a mut dyn DriveActuator, speeds: DriveSpeeds) -> Self {
        debug!(actuator = actuator.id(), "actuator acquired");
        Self {
            actuator,
            speeds,
            dispatched: 0,
        }
    }

    /// Send one command to the actuator.
    pub fn send(&mut self, command: DriveCommand) {
        self.actuator.dispatch(command, self.speeds);
        self.dispatched += 1;
    }

    /// Number of commands sent through this guard (excluding the final stop).
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl Drop for ActuatorGuard<'_> {
    fn drop(&mut self) {
        self.actuator.dispatch(DriveCommand::Stop, self.speeds);
        info!(
            actuator = self.actuator.id(),
            dispatched = self.dispatched,
            "actuator released; stop dispatched"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process actuator used only for tests.
    struct MockActuator {
        id: String,
        sent: Vec<DriveCommand>,
    }

    impl MockActuator {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                sent: Vec::new(),
            }
        }
    }

    impl DriveActuator for MockActuator {
        fn id(&self) -> &str {
            &self.id
        }

        fn dispatch(&mut self, command: DriveCommand, _speeds: DriveSpeeds) {
            self.sent.push(command);
        }
    }

    #[test]
    fn every_command_is_dispatchable() {
        let mut act = MockActuator::new("drive_base");
        for cmd in DriveCommand::ALL {
            act.dispatch(cmd, DriveSpeeds::new(10.0, 5.0));
        }
        assert_eq!(act.sent, DriveCommand::ALL.to_vec());
    }

    #[test]
    fn guard_sends_stop_on_drop() {
        let mut act = MockActuator::new("drive_base");
        {
            let mut guard = ActuatorGuard::new(&mut act, DriveSpeeds::new(10.0, 5.0));
            guard.send(DriveCommand::Forward);
            guard.send(DriveCommand::Forward);
            assert_eq!(guard.dispatched(), 2);
        }
        assert_eq!(
            act.sent,
            vec![
                DriveCommand::Forward,
                DriveCommand::Forward,
                DriveCommand::Stop
            ]
        );
    }

    #[test]
    fn guard_sends_stop_when_unwinding() {
        let mut act = MockActuator::new("drive_base");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = ActuatorGuard::new(&mut act, DriveSpeeds::new(1.0, 1.0));
            guard.send(DriveCommand::TurnLeft);
            panic!("decision blew up");
        }));
        assert!(result.is_err());
        assert_eq!(act.sent.last(), Some(&DriveCommand::Stop));
    }
}
