//! Transition rules of the flywheel state machine.
//!
//! ```text
//!   Stopped ──start──▶ Starting ──ready──▶ Started ──stop / idle──▶ Stopping
//!      ▲                                    │  ▲                       │
//!      │                          unhealthy │  │ recovered             │
//!      │                                    ▼  │                       │
//!      │                                  Unhealthy                    │
//!      └──────────────────────────ready────────────────────────────────┘
//! ```
//!
//! The authority never refuses a transition: health reports are applied as
//! observed. These helpers classify transitions so unexpected ones are logged.

use flywheel_core::State;

/// Check if a state transition is part of the regular lifecycle.
#[must_use]
pub const fn is_valid_transition(from: State, to: State) -> bool {
    use State::{Started, Starting, Stopped, Stopping, Unhealthy};

    matches!(
        (from, to),
        // Orchestrated start, then readiness
        (Stopped, Starting)
            | (Starting, Started)
            // Explicit or idle stop
            | (Started, Stopping)
            | (Stopping, Stopped)
            // Health watcher verdicts
            | (Started, Unhealthy)
            | (Unhealthy, Started)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use State::*;

        assert!(is_valid_transition(Stopped, Starting));
        assert!(is_valid_transition(Starting, Started));
        assert!(is_valid_transition(Started, Stopping));
        assert!(is_valid_transition(Stopping, Stopped));
        assert!(is_valid_transition(Started, Unhealthy));
        assert!(is_valid_transition(Unhealthy, Started));
    }

    #[test]
    fn invalid_transitions() {
        use State::*;

        // Starting must wait for readiness
        assert!(!is_valid_transition(Stopped, Started));
        // Unhealthy is only reachable from a running pool
        assert!(!is_valid_transition(Stopped, Unhealthy));
        assert!(!is_valid_transition(Stopping, Unhealthy));
        // No cancel of an in-flight start
        assert!(!is_valid_transition(Starting, Stopping));
    }

    #[test]
    fn unhealthy_pool_has_no_stop_path() {
        use State::*;

        assert!(!is_valid_transition(Unhealthy, Stopping));
        assert!(!is_valid_transition(Unhealthy, Stopped));
    }
}
