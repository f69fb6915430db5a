//! Configuration loading.
//!
//! The whole process is configured from one JSON file with a section per
//! concern. A few settings can be overridden from the environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flywheel_control::ControlConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/flywheel/config.json";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The configuration is syntactically valid but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete process configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlywheelConfig {
    /// HTTP front end.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Control core: timers and managed resources.
    #[serde(default)]
    pub control: ControlConfig,
    /// Resource-management API.
    #[serde(default)]
    pub resources: ResourcesConfig,
}

impl FlywheelConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid configuration JSON.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Load from `FLYWHEEL_CONFIG` (or the default path), apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("FLYWHEEL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `LISTEN_ADDR` and `FLYWHEEL_STATUS_FILE` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.gateway.listen_addr = addr;
        }
        if let Some(path) = lookup("FLYWHEEL_STATUS_FILE") {
            self.gateway.status_file = PathBuf::from(path);
        }
    }

    /// Check that the configuration can serve requests.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.endpoint.is_empty() && self.gateway.vhosts.is_empty() {
            return Err(ConfigError::Invalid(
                "no endpoint or vhosts configured".into(),
            ));
        }
        if let Some((host, _)) = self
            .gateway
            .vhosts
            .iter()
            .find(|(_, addr)| addr.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "vhost {host} has an empty address"
            )));
        }
        if self.control.idle_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "control.idle_timeout_seconds must be positive".into(),
            ));
        }
        if self.control.tick_interval_seconds == 0 || self.control.hc_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "control tick and health check intervals must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the HTTP front end.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Default backend address (`host:port`).
    #[serde(default)]
    pub endpoint: String,

    /// Backend address per `Host` header.
    #[serde(default)]
    pub vhosts: HashMap<String, String>,

    /// Where the status snapshot is kept across restarts.
    #[serde(default = "GatewayConfig::default_status_file")]
    pub status_file: PathBuf,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds. Covers forwarding, and start requests
    /// waiting on the lifecycle sequence.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_status_file() -> PathBuf {
        PathBuf::from("/var/lib/flywheel/status.json")
    }

    const fn default_max_body() -> usize {
        10 * 1024 * 1024 // 10 MB
    }

    const fn default_request_timeout() -> u64 {
        300
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Backend address for a request with the given `Host` header.
    ///
    /// Tries the full host, then the host without its port, then the default
    /// endpoint. Returns `None` if nothing usable is configured.
    #[must_use]
    pub fn resolve_endpoint(&self, host: Option<&str>) -> Option<&str> {
        let vhost = host.and_then(|host| {
            self.vhosts.get(host).or_else(|| {
                host.rsplit_once(':')
                    .and_then(|(name, _)| self.vhosts.get(name))
            })
        });

        vhost
            .map(String::as_str)
            .or(Some(self.endpoint.as_str()))
            .filter(|addr| !addr.trim().is_empty())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            endpoint: String::new(),
            vhosts: HashMap::new(),
            status_file: Self::default_status_file(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// Configuration for the resource-management API client.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    /// Base URL. Without it, lifecycle calls are logged and skipped.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "ResourcesConfig::default_timeout")]
    pub timeout_seconds: u64,
}

impl ResourcesConfig {
    const fn default_timeout() -> u64 {
        30
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_seconds: Self::default_timeout(),
        }
    }
}
