//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use flywheel_control::FlywheelHandle;

use crate::config::GatewayConfig;
use crate::error::ApiError;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    /// Handle to the flywheel authority.
    pub flywheel: FlywheelHandle,
    /// HTTP client used to forward requests to the backend.
    pub client: reqwest::Client,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state with a forwarding client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(flywheel: FlywheelHandle, config: GatewayConfig) -> Result<Self, ApiError> {
        // Redirects belong to the browser, not to the proxy.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(flywheel, client, config))
    }

    /// Create a new gateway state with a custom forwarding client.
    #[must_use]
    pub const fn with_client(
        flywheel: FlywheelHandle,
        client: reqwest::Client,
        config: GatewayConfig,
    ) -> Self {
        Self {
            flywheel,
            client,
            config,
        }
    }
}
