//! HTTP request handlers.
//!
//! Control API endpoints live under `/__flywheel`; every other request goes
//! through [`proxy::proxy`].

pub mod api;
pub mod health;
pub mod proxy;
