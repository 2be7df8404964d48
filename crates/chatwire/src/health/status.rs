//! Network status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse network status derived from connectivity events and probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// The OS reports no network.
    Offline,
    /// Network is up, server not yet confirmed.
    Connecting,
    /// The last probe succeeded.
    Healthy,
    /// The server answered with an error.
    Unhealthy,
    /// The server did not answer in time.
    Unreachable,
}

impl NetworkStatus {
    /// Whether the transport may connect.
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Lowercase name, as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of everything the monitor knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkState {
    /// Last value of the OS connectivity signal.
    pub browser_online: bool,
    /// Whether the last probe reached a healthy server.
    pub server_reachable: bool,
    /// Derived status.
    pub status: NetworkStatus,
    /// When the last probe finished, whatever its outcome.
    pub last_check: Option<DateTime<Utc>>,
}

impl NetworkState {
    /// Initial state before any probe has run.
    #[must_use]
    pub const fn initial(online: bool) -> Self {
        Self {
            browser_online: online,
            server_reachable: false,
            status: if online {
                NetworkStatus::Connecting
            } else {
                NetworkStatus::Offline
            },
            last_check: None,
        }
    }

    /// User-facing description, or `None` when everything is fine.
    #[must_use]
    pub const fn describe(&self) -> Option<&'static str> {
        if !self.browser_online {
            return Some("No internet connection. Please check your network settings.");
        }
        match self.status {
            NetworkStatus::Healthy => None,
            NetworkStatus::Unreachable => Some("Cannot connect to server."),
            NetworkStatus::Unhealthy => Some("Server is currently unavailable."),
            NetworkStatus::Offline | NetworkStatus::Connecting => {
                Some("Connecting to server...")
            }
        }
    }
}
