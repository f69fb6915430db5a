//! Lifecycle states of the managed resource pool.
//!
//! ```text
//!     ┌─────────┐  start   ┌──────────┐  ready   ┌─────────┐
//!     │ STOPPED │─────────▶│ STARTING │─────────▶│ STARTED │◀───┐
//!     └─────────┘          └──────────┘          └────┬────┘    │ recovered
//!          ▲                                          │    ┌────┴──────┐
//!          │ ready         ┌──────────┐  stop / idle  │    │ UNHEALTHY │
//!          └───────────────│ STOPPING │◀──────────────┤    └───────────┘
//!                          └──────────┘               │         ▲
//!                                                     └─────────┘
//!                                                      health check
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of the managed resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum State {
    /// Resources are suspended. Initial state absent a snapshot.
    #[default]
    Stopped = 0,
    /// Start sequence issued, waiting for resources to become ready.
    Starting = 1,
    /// Resources are ready and traffic is forwarded.
    Started = 2,
    /// Stop sequence issued, waiting for resources to wind down.
    Stopping = 3,
    /// Resources were started but the health watcher reports them unhealthy.
    Unhealthy = 4,
}

impl State {
    /// All states, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Stopped,
        Self::Starting,
        Self::Started,
        Self::Stopping,
        Self::Unhealthy,
    ];

    /// Human-readable name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Unhealthy => "UNHEALTHY",
        }
    }

    /// Convert the state to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        for state in State::ALL {
            assert_eq!(state.as_str().parse::<State>().unwrap(), state);
        }
        assert_eq!("started".parse::<State>().unwrap(), State::Started);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "PAUSED".parse::<State>().unwrap_err();
        assert_eq!(err, CoreError::UnknownState("PAUSED".into()));
    }

    #[test]
    fn numeric_codes() {
        let codes: Vec<u8> = State::ALL.into_iter().map(State::as_u8).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn serde_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&State::Unhealthy).unwrap(),
            "\"UNHEALTHY\""
        );
        let state: State = serde_json::from_str("\"STOPPING\"").unwrap();
        assert_eq!(state, State::Stopping);
    }

    #[test]
    fn default_is_stopped() {
        assert_eq!(State::default(), State::Stopped);
    }
}
