//! JSON control API.
//!
//! Every endpoint sends one ping and returns the resulting pong. A lifecycle
//! failure is reported as `502` with the pong as body, so callers still see
//! the state the authority settled in.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use flywheel_control::{Ping, Pong};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Request body for scheduling the idle shutdown.
#[derive(Debug, Deserialize)]
pub struct TimeoutRequest {
    /// Seconds from now until the idle shutdown.
    pub seconds: u64,
}

fn reply(pong: Pong) -> (StatusCode, Json<Pong>) {
    let status = if pong.is_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(pong))
}

async fn send(state: &GatewayState, ping: Ping) -> Result<(StatusCode, Json<Pong>), ApiError> {
    Ok(reply(state.flywheel.ping(ping).await?))
}

/// Current state. Never extends the session.
///
/// # Errors
///
/// Returns `ApiError::Unavailable` if the authority has exited.
pub async fn status(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, ApiError> {
    send(&state, Ping::status()).await
}

/// Start the resources if they are stopped.
///
/// # Errors
///
/// Returns `ApiError::Unavailable` if the authority has exited.
pub async fn start(State(state): State<Arc<GatewayState>>) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Start requested via control API");
    send(&state, Ping::start()).await
}

/// Stop the resources if they are started.
///
/// # Errors
///
/// Returns `ApiError::Unavailable` if the authority has exited.
pub async fn stop(State(state): State<Arc<GatewayState>>) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Stop requested via control API");
    send(&state, Ping::stop()).await
}

/// Schedule the idle shutdown of a started pool.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` for a zero timeout and
/// `ApiError::Unavailable` if the authority has exited.
pub async fn set_timeout(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<TimeoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.seconds == 0 {
        return Err(ApiError::BadRequest("seconds must be positive".into()));
    }
    send(&state, Ping::stop_after(Duration::from_secs(body.seconds))).await
}
