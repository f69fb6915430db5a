//! Gateway liveness endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Last state published by the authority.
    pub flywheel: &'static str,
}

/// Health check handler.
///
/// Reports that the gateway itself is up. Reads the published state without
/// pinging the authority, so it answers even while a lifecycle sequence runs
/// and never extends the session.
///
/// # Example
///
/// ```text
/// GET /__flywheel/health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "flywheel": "STOPPED"
/// }
/// ```
pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        flywheel: state.flywheel.current_state().as_str(),
    };

    (StatusCode::OK, Json(response))
}
