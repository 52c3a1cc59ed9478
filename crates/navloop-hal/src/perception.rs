//! Generic `PerceptionSource` trait for whatever produces obstacle points and
//! a robot pose estimate (lidar clustering, depth camera, simulator, …).

use navloop_types::PerceptionSnapshot;

/// A source of perception snapshots.
///
/// Implementations must be cheap to poll every cycle and must not have side
/// effects beyond reading the latest sensor state.  A disconnected sensor is
/// reported as [`PerceptionSnapshot::NotConnected`], never as partial data.
pub trait PerceptionSource: Send {
    /// Stable identifier for this source, e.g. `"front_lidar"`.
    fn id(&self) -> &str;

    /// Return the latest snapshot.
    fn read(&mut self) -> PerceptionSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use navloop_types::RobotPose;

    struct MockSource {
        id: String,
        connected: bool,
    }

    impl PerceptionSource for MockSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn read(&mut self) -> PerceptionSnapshot {
            if !self.connected {
                return PerceptionSnapshot::NotConnected;
            }
            PerceptionSnapshot::Frame {
                points: vec![Point2::new(1.0, 0.0)],
                pose: RobotPose::default(),
            }
        }
    }

    #[test]
    fn mock_source_reports_link_state() {
        let mut src = MockSource {
            id: "front_lidar".to_string(),
            connected: false,
        };
        assert_eq!(src.id(), "front_lidar");
        assert_eq!(src.read(), PerceptionSnapshot::NotConnected);

        src.connected = true;
        match src.read() {
            PerceptionSnapshot::Frame { points, .. } => assert_eq!(points.len(), 1),
            PerceptionSnapshot::NotConnected => panic!("expected a frame"),
        }
    }
}
