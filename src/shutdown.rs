//! Cooperative shutdown shared by every worker of a session.
//!
//! [`ShutdownSignal`] is a monotone tri-state flag. The first stop request
//! moves it from `Running` to `Stopping` and every loop in the crate polls
//! it once per iteration, so all workers wind down within one receive
//! timeout. A second request escalates to `Forced`; the caller that observes
//! the escalation terminates the process without waiting for anyone. The
//! signal itself never touches the OS or the process: how a request arrived
//! and what `Forced` does about it are the caller's business.

use std::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const FORCED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Stopping,
    Forced,
}

#[derive(Debug, Default)]
pub struct ShutdownSignal {
    state: AtomicU8,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::Relaxed) {
            RUNNING => ShutdownState::Running,
            STOPPING => ShutdownState::Stopping,
            _ => ShutdownState::Forced,
        }
    }

    /// True until the first stop request or deadline. Workers poll this once
    /// per loop iteration.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Relaxed) == RUNNING
    }

    /// Registers an external stop request and returns the resulting state.
    ///
    /// The first request begins cooperative shutdown (`Stopping`); any
    /// request after that escalates to `Forced`. The state only moves
    /// forward, it is never reset.
    pub fn request_stop(&self) -> ShutdownState {
        match self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => ShutdownState::Stopping,
            Err(_) => {
                self.state.store(FORCED, Ordering::Relaxed);
                ShutdownState::Forced
            }
        }
    }

    /// Begins cooperative shutdown without escalating. Used when a session
    /// deadline elapses; a no-op if shutdown is already under way.
    pub fn stop(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::Relaxed, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let signal = ShutdownSignal::new();
        assert!(signal.is_running());
        assert_eq!(signal.state(), ShutdownState::Running);
    }

    #[test]
    fn first_request_stops_second_forces() {
        let signal = ShutdownSignal::new();

        assert_eq!(signal.request_stop(), ShutdownState::Stopping);
        assert!(!signal.is_running());

        assert_eq!(signal.request_stop(), ShutdownState::Forced);
        assert_eq!(signal.state(), ShutdownState::Forced);
    }

    #[test]
    fn deadline_stop_does_not_escalate() {
        let signal = ShutdownSignal::new();

        signal.stop();
        assert_eq!(signal.state(), ShutdownState::Stopping);

        signal.stop();
        assert_eq!(signal.state(), ShutdownState::Stopping);
    }

    #[test]
    fn external_request_after_deadline_stop_forces() {
        let signal = ShutdownSignal::new();

        signal.stop();
        assert_eq!(signal.request_stop(), ShutdownState::Forced);
    }

    #[test]
    fn state_never_moves_backward() {
        let signal = ShutdownSignal::new();
        signal.request_stop();
        signal.request_stop();

        signal.stop();
        assert_eq!(signal.state(), ShutdownState::Forced);
    }
}
