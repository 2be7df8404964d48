//! Connection status types.

use std::sync::atomic::{AtomicU8, Ordering};

/// Status of the transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Never asked to connect.
    Idle,
    /// First attempt in flight.
    Connecting,
    /// Socket open.
    Connected,
    /// Connection lost, another attempt is scheduled or in flight.
    Reconnecting,
    /// Closed on purpose. No reconnect will happen.
    Disconnected,
}

impl ConnectionStatus {
    /// Lowercase name, as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic wrapper for connection status.
///
/// Only the transport task stores; any thread may load.
#[derive(Debug)]
pub struct AtomicConnectionStatus(AtomicU8);

impl AtomicConnectionStatus {
    /// Create a new atomic status.
    #[must_use]
    pub const fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    /// Load the current status.
    #[must_use]
    pub fn load(&self) -> ConnectionStatus {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionStatus::Idle,
            1 => ConnectionStatus::Connecting,
            2 => ConnectionStatus::Connected,
            3 => ConnectionStatus::Reconnecting,
            _ => ConnectionStatus::Disconnected,
        }
    }

    /// Store a new status.
    pub(crate) fn store(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_discriminants() {
        assert_eq!(ConnectionStatus::Idle as u8, 0);
        assert_eq!(ConnectionStatus::Connecting as u8, 1);
        assert_eq!(ConnectionStatus::Connected as u8, 2);
        assert_eq!(ConnectionStatus::Reconnecting as u8, 3);
        assert_eq!(ConnectionStatus::Disconnected as u8, 4);
    }

    #[test]
    fn test_atomic_connection_status() {
        let status = AtomicConnectionStatus::new(ConnectionStatus::Idle);
        assert_eq!(status.load(), ConnectionStatus::Idle);

        for next in [
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Reconnecting,
            ConnectionStatus::Disconnected,
        ] {
            status.store(next);
            assert_eq!(status.load(), next);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
    }
}
