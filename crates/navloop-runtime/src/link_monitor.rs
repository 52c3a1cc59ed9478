//! [`LinkMonitor`] – sensor link health tracker.
//!
//! The control loop retries a disconnected perception source immediately and
//! without limit.  The monitor only watches those retries: it counts
//! consecutive `NotConnected` polls, raises a single warning once the link
//! has been silent for longer than its deadline, and logs when frames start
//! arriving again.  It never changes retry behaviour.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Health state reported for the sensor link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// A frame has arrived within the deadline.
    Healthy,
    /// No frame has arrived within the deadline.
    Silent,
}

/// Tracks the time since the last good perception frame.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use navloop_runtime::link_monitor::{LinkHealth, LinkMonitor};
///
/// let mut link = LinkMonitor::new(Duration::from_secs(1));
/// link.record_dropout();
/// assert_eq!(link.consecutive_dropouts(), 1);
/// link.record_frame();
/// assert_eq!(link.health(), LinkHealth::Healthy);
/// ```
#[derive(Debug)]
pub struct LinkMonitor {
    warn_after: Duration,
    last_frame: Instant,
    consecutive_dropouts: u64,
    warned: bool,
}

impl LinkMonitor {
    /// The deadline starts counting now, so a fresh monitor is healthy.
    pub fn new(warn_after: Duration) -> Self {
        Self {
            warn_after,
            last_frame: Instant::now(),
            consecutive_dropouts: 0,
            warned: false,
        }
    }

    /// Record a successfully received frame, resetting the deadline.
    pub fn record_frame(&mut self) {
        if self.consecutive_dropouts > 0 {
            info!(
                dropouts = self.consecutive_dropouts,
                silent_for_ms = self.last_frame.elapsed().as_millis() as u64,
                "sensor link recovered"
            );
        }
        self.last_frame = Instant::now();
        self.consecutive_dropouts = 0;
        self.warned = false;
    }

    /// Record a `NotConnected` poll.
    pub fn record_dropout(&mut self) {
        self.consecutive_dropouts += 1;
        if !self.warned && self.health() == LinkHealth::Silent {
            warn!(
                dropouts = self.consecutive_dropouts,
                deadline_ms = self.warn_after.as_millis() as u64,
                "sensor link silent past deadline; still retrying"
            );
            self.warned = true;
        }
    }

    pub fn health(&self) -> LinkHealth {
        if self.last_frame.elapsed() <= self.warn_after {
            LinkHealth::Healthy
        } else {
            LinkHealth::Silent
        }
    }

    /// `NotConnected` polls since the last good frame.
    pub fn consecutive_dropouts(&self) -> u64 {
        self.consecutive_dropouts
    }

    /// `true` once the silence warning has been emitted for the current
    /// outage.
    pub fn has_warned(&self) -> bool {
        self.warned
    }
}
