//! Core types for flywheel.
//!
//! This crate provides the foundational types shared by the control core and
//! the HTTP gateway:
//!
//! - **State**: the closed set of lifecycle states for the managed resource pool
//! - **Identifiers**: strongly-typed instance IDs and scaling group names
//! - **Error types**: parsing errors shared across crates
//!
//! # Example
//!
//! ```
//! use flywheel_core::{GroupName, InstanceId, State};
//!
//! let instance = InstanceId::new("i-0123456789abcdef0").unwrap();
//! let group = GroupName::new("asg-web").unwrap();
//!
//! assert_eq!(State::Started.as_str(), "STARTED");
//! assert_eq!("STOPPING".parse::<State>().unwrap(), State::Stopping);
//! # let _ = (instance, group);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod state;

pub use error::{CoreError, Result};
pub use ids::{GroupName, IdError, InstanceId};
pub use state::State;
