//! HTTP front end for flywheel.
//!
//! This crate puts the flywheel authority in front of a backend:
//!
//! - every request pings the authority, keeping a running pool alive
//! - requests are forwarded to the backend while it is started
//! - otherwise a page explains the state and offers to start the pool
//! - a small JSON API under `/__flywheel` reads and drives the state
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      flywheel-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │ Control API │ │   Pages     │ │    Reverse proxy     │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                │ FlywheelHandle                 │ reqwest
//!                ▼                                ▼
//!        ┌──────────────┐                 ┌──────────────┐
//!        │   Flywheel   │                 │   Backend    │
//!        │  authority   │                 │  (endpoint)  │
//!        └──────────────┘                 └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use flywheel_control::{health, ControlConfig, Flywheel, NoopResourceClient};
//! use flywheel_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(NoopResourceClient::new());
//! let flywheel = Flywheel::new(client, &ControlConfig::default(), Utc::now());
//! let (_health_tx, health_rx) = health::channel();
//! let (handle, _join) = flywheel.spawn(health_rx);
//!
//! let config = GatewayConfig {
//!     endpoint: "10.0.0.10:80".into(),
//!     ..GatewayConfig::default()
//! };
//! let app = create_router(GatewayState::new(handle, config)?);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod pages;
pub mod routes;
pub mod state;

pub use config::{ConfigError, FlywheelConfig, GatewayConfig, ResourcesConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
