//! Client configuration.
//!
//! Configuration for a chatwire client, including:
//! - Server base URL (health probe) and WebSocket endpoint
//! - Reconnect backoff
//! - Heartbeat interval
//! - Health probe timeout and polling interval

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::health::HealthConfig;
use crate::transport::{HeartbeatConfig, ReconnectConfig, TransportConfig};

/// Reconnect backoff settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectSection {
    /// Delay before the first reconnect, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for the delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            max_delay_ms: 30_000,
        }
    }
}

/// Heartbeat settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartbeatSection {
    /// Seconds between pings.
    pub interval_secs: u64,
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self { interval_secs: 20 }
    }
}

/// Health monitoring settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthSection {
    /// Upper bound for one probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Seconds between passive probes.
    pub poll_interval_secs: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 3000,
            poll_interval_secs: 30,
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP base URL of the server.
    pub server_url: String,
    /// WebSocket endpoint.
    pub ws_url: String,
    /// Path of the health endpoint, relative to `server_url`.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Reconnect configuration.
    #[serde(default)]
    pub reconnect: ReconnectSection,
    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatSection,
    /// Health configuration.
    #[serde(default)]
    pub health: HealthSection,
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            ws_url: "ws://localhost:3000/ws".to_string(),
            health_path: default_health_path(),
            reconnect: ReconnectSection::default(),
            heartbeat: HeartbeatSection::default(),
            health: HealthSection::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ClientError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self, ClientError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ClientError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON, the format `from_json` reads.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ClientError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ClientError> {
        check_scheme("server_url", &self.server_url, &["http", "https"])?;
        check_scheme("ws_url", &self.ws_url, &["ws", "wss"])?;

        if !self.health_path.starts_with('/') {
            return Err(ClientError::Config(
                "health_path must start with '/'".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(ClientError::Config(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(ClientError::Config(
                "reconnect.base_delay_ms cannot exceed reconnect.max_delay_ms".to_string(),
            ));
        }

        if self.heartbeat.interval_secs == 0 {
            return Err(ClientError::Config(
                "heartbeat.interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.health.probe_timeout_ms == 0 {
            return Err(ClientError::Config(
                "health.probe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.health.poll_interval_secs == 0 {
            return Err(ClientError::Config(
                "health.poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Transport settings.
    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            },
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(self.heartbeat.interval_secs),
            },
        }
    }

    /// Health monitor settings.
    #[must_use]
    pub fn health_monitor(&self) -> HealthConfig {
        HealthConfig {
            probe_timeout: Duration::from_millis(self.health.probe_timeout_ms),
            poll_interval: Duration::from_secs(self.health.poll_interval_secs),
        }
    }
}

fn check_scheme(field: &str, value: &str, allowed: &[&str]) -> Result<(), ClientError> {
    if value.is_empty() {
        return Err(ClientError::Config(format!("{field} cannot be empty")));
    }
    let url = Url::parse(value)
        .map_err(|e| ClientError::Config(format!("{field} is not a valid URL: {e}")))?;
    if !allowed.contains(&url.scheme()) {
        return Err(ClientError::Config(format!(
            "{field} must use one of: {}",
            allowed.join(", ")
        )));
    }
    Ok(())
}
