//! Session liveness flag with a close-once invariant (spec §4.7
//! "SessionState"): the "is it still alive" check is a simple atomic flag
//! rather than a process check, since a kernel session has no external
//! process to poll.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct SessionState {
    alive: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Transition to closed exactly once. Returns `true` the first time it
    /// is called, `false` on every call after (spec §4.7 "logout is
    /// idempotent").
    pub fn close(&self) -> bool {
        self.alive
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_alive() {
        assert!(SessionState::new().is_alive());
    }

    #[test]
    fn close_is_idempotent() {
        let state = SessionState::new();
        assert!(state.close());
        assert!(!state.is_alive());
        assert!(!state.close());
    }
}
