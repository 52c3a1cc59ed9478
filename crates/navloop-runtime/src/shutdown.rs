//! [`ShutdownSignal`] – cooperative cancellation for the control loop.
//!
//! The loop checks the signal at the top of every cycle.  An in-flight cycle
//! always runs to completion (including dispatch) before the signal is
//! observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag.  Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the loop stop after the current cycle.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_triggered());
        handle.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn trigger_from_another_thread_is_visible() {
        let signal = ShutdownSignal::new();
        let handle = signal.clone();
        std::thread::spawn(move || handle.trigger())
            .join()
            .expect("trigger thread panicked");
        assert!(signal.is_triggered());
    }
}
