//! Ping/pong protocol types and control configuration.
//!
//! A [`Ping`] describes one caller intent; the authority answers every ping with
//! exactly one [`Pong`] snapshot of its state.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flywheel_core::{GroupName, InstanceId, State};
use serde::{Deserialize, Serialize};

/// A caller request to the authority.
///
/// Within `STARTED` the flags are considered in the order `noop`,
/// `request_stop`, `set_timeout`; a ping with none of them refreshes the idle
/// deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping {
    /// Explicit idle deadline override, measured from the time of processing.
    pub set_timeout: Option<Duration>,
    /// Start the resources if they are stopped.
    pub request_start: bool,
    /// Stop the resources if they are started.
    pub request_stop: bool,
    /// Pure status read; never changes state or the deadline.
    pub noop: bool,
}

impl Ping {
    /// A plain traffic ping that keeps a running session alive.
    #[must_use]
    pub const fn traffic() -> Self {
        Self {
            set_timeout: None,
            request_start: false,
            request_stop: false,
            noop: false,
        }
    }

    /// Request a start.
    #[must_use]
    pub const fn start() -> Self {
        Self {
            request_start: true,
            ..Self::traffic()
        }
    }

    /// Request a stop.
    #[must_use]
    pub const fn stop() -> Self {
        Self {
            request_stop: true,
            ..Self::traffic()
        }
    }

    /// Status read that leaves the idle deadline untouched.
    #[must_use]
    pub const fn status() -> Self {
        Self {
            noop: true,
            ..Self::traffic()
        }
    }

    /// Schedule the idle shutdown `timeout` from now.
    #[must_use]
    pub const fn stop_after(timeout: Duration) -> Self {
        Self {
            set_timeout: Some(timeout),
            ..Self::traffic()
        }
    }
}

/// The authority's reply to a [`Ping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pong {
    /// Current state.
    #[serde(skip)]
    pub status: State,
    /// Human-readable state name.
    #[serde(rename = "status")]
    pub status_name: String,
    /// Error from a lifecycle sequence triggered by this ping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the last start attempt began.
    #[serde(rename = "last-started", skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
    /// When the last stop attempt began.
    #[serde(rename = "last-stopped", skip_serializing_if = "Option::is_none")]
    pub last_stopped: Option<DateTime<Utc>>,
    /// When an idle shutdown is due, if still started.
    #[serde(rename = "stop-due-at")]
    pub stop_at: DateTime<Utc>,
}

impl Pong {
    /// Returns true if the ping that produced this pong hit a lifecycle error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Scaling groups managed by flywheel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingConfig {
    /// Groups shrunk to zero on stop and restored to the given size on start.
    #[serde(default)]
    pub terminate: BTreeMap<GroupName, u32>,
    /// Groups whose members are stopped and started in place.
    #[serde(default)]
    pub stop: Vec<GroupName>,
}

/// Configuration for the control core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Idle time after the last traffic ping before resources are stopped (seconds).
    #[serde(default = "ControlConfig::default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Interval between health watcher polls (seconds).
    #[serde(default = "ControlConfig::default_hc_interval")]
    pub hc_interval_seconds: u64,
    /// Interval of the authority's housekeeping tick (seconds).
    #[serde(default = "ControlConfig::default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Capacity of the authority's inbound ping queue.
    #[serde(default = "ControlConfig::default_queue_capacity")]
    pub queue_capacity: usize,
    /// Raw instances started and stopped directly.
    #[serde(default)]
    pub instances: Vec<InstanceId>,
    /// Managed scaling groups.
    #[serde(default)]
    pub autoscaling: AutoScalingConfig,
}

impl ControlConfig {
    const fn default_idle_timeout() -> u64 {
        3 * 60 * 60 // 3 hours
    }

    const fn default_hc_interval() -> u64 {
        30
    }

    const fn default_tick_interval() -> u64 {
        1
    }

    const fn default_queue_capacity() -> usize {
        64
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// Get the health check interval as a `Duration`.
    #[must_use]
    pub const fn hc_interval(&self) -> Duration {
        Duration::from_secs(self.hc_interval_seconds)
    }

    /// Get the housekeeping tick interval as a `Duration`.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: Self::default_idle_timeout(),
            hc_interval_seconds: Self::default_hc_interval(),
            tick_interval_seconds: Self::default_tick_interval(),
            queue_capacity: Self::default_queue_capacity(),
            instances: Vec::new(),
            autoscaling: AutoScalingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_constructors_set_one_intent() {
        assert_eq!(Ping::traffic(), Ping::default());
        assert!(Ping::start().request_start);
        assert!(Ping::stop().request_stop);
        assert!(Ping::status().noop);
        assert_eq!(
            Ping::stop_after(Duration::from_secs(60)).set_timeout,
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn pong_json_shape() {
        let stop_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let pong = Pong {
            status: State::Started,
            status_name: State::Started.as_str().to_string(),
            error: None,
            last_started: Some(stop_at),
            last_stopped: None,
            stop_at,
        };

        let json = serde_json::to_value(&pong).unwrap();
        assert_eq!(json["status"], "STARTED");
        assert_eq!(json["stop-due-at"], "2024-05-01T12:00:00Z");
        assert_eq!(json["last-started"], "2024-05-01T12:00:00Z");
        assert!(json.get("error").is_none());
        assert!(json.get("last-stopped").is_none());
    }

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(10_800));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.hc_interval(), Duration::from_secs(30));
        assert!(config.instances.is_empty());
        assert_eq!(config.autoscaling, AutoScalingConfig::default());
    }

    #[test]
    fn control_config_from_json() {
        let config: ControlConfig = serde_json::from_str(
            r#"{
                "idle_timeout_seconds": 600,
                "instances": ["i-1"],
                "autoscaling": { "terminate": { "asg-web": 2 }, "stop": ["asg-db"] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.idle_timeout(), Duration::from_secs(600));
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.instances, vec![InstanceId::new("i-1").unwrap()]);
        assert_eq!(
            config.autoscaling.terminate.get(&GroupName::new("asg-web").unwrap()),
            Some(&2)
        );
        assert_eq!(config.autoscaling.stop, vec![GroupName::new("asg-db").unwrap()]);
    }
}
