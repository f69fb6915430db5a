//! Control core for flywheel.
//!
//! This crate owns the lifecycle of the managed resource pool: a single
//! authority task serializes caller pings, a housekeeping tick and health
//! reports into one state machine, and drives ordered start/stop sequences
//! against the resource-management API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Gateway (proxy, control API)                │
//! └─────────────────────────────────────────────────────────────┘
//!                │ FlywheelHandle::ping → Pong
//!                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Flywheel authority                       │
//! │   pings ──┐                                                  │
//! │   tick ───┼──▶ select! ──▶ state, ready, stop_at ──▶ watch   │
//! │   health ─┘        │                                  │      │
//! └────────────────────┼──────────────────────────────────┼──────┘
//!                      ▼                                  ▼
//!               ┌──────────────┐                  ┌───────────────┐
//!               │ Orchestrator │                  │ HealthWatcher │
//!               └──────┬───────┘                  └───────┬───────┘
//!                      └──────────▶ ResourceClient ◀──────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use flywheel_control::{health, ControlConfig, Flywheel, HealthWatcher, NoopResourceClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::default();
//! let client = Arc::new(NoopResourceClient::new());
//!
//! let flywheel = Flywheel::new(Arc::clone(&client), &config, Utc::now());
//! let (health_tx, health_rx) = health::channel();
//! HealthWatcher::new(client, &config, flywheel.subscribe(), health_tx).spawn();
//! let (handle, join) = flywheel.spawn(health_rx);
//!
//! let pong = handle.start().await?;
//! println!("flywheel is {}", pong.status);
//!
//! handle.shutdown().await;
//! let flywheel = join.await?;
//! println!("final state: {}", flywheel.status());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod authority;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod orchestrator;
pub mod resource_client;
pub mod snapshot;
pub mod types;

pub use authority::{Flywheel, FlywheelHandle};
pub use error::{ControlError, LifecycleError, LifecycleStep, ResourceError, Result, SnapshotError};
pub use health::{HealthReport, HealthWatcher};
pub use orchestrator::Orchestrator;
pub use resource_client::{
    GroupDescription, HttpResourceClient, InstanceState, InstanceStatus, NoopResourceClient,
    ResourceClient, REPLACE_UNHEALTHY,
};
pub use snapshot::StatusSnapshot;
pub use types::{AutoScalingConfig, ControlConfig, Ping, Pong};

#[cfg(any(test, feature = "test-utils"))]
pub use resource_client::mock::MockResourceClient;

// Re-export commonly used types from dependencies for convenience
pub use flywheel_core::{GroupName, InstanceId, State};
