//! Error types for chatwire.

use thiserror::Error;

use crate::health::NetworkStatus;

/// Why a connect request was refused before any socket was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectRefusal {
    /// No signed-in user.
    NotAuthenticated,
    /// The network is not healthy.
    Network(NetworkStatus),
}

impl ConnectRefusal {
    /// The notice shown to the user for this refusal.
    #[must_use]
    pub const fn notice(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Please sign in first.",
            Self::Network(NetworkStatus::Offline) => {
                "Offline, please check your internet connection."
            }
            Self::Network(NetworkStatus::Connecting) => {
                "Still connecting to the server, please retry shortly."
            }
            Self::Network(_) => "Cannot reach the server, please retry later.",
        }
    }
}

impl std::fmt::Display for ConnectRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "user is not signed in"),
            Self::Network(status) => write!(f, "network is {status}"),
        }
    }
}

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect was refused by a precondition.
    #[error("connect refused: {0}")]
    Refused(ConnectRefusal),

    /// The endpoint URL could not be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An operation needed an endpoint but `connect` was never accepted.
    #[error("no endpoint configured, call connect first")]
    NoEndpoint,

    /// The transport task has stopped.
    #[error("transport closed")]
    Closed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Health probe could not be built or sent.
    #[error("health probe error: {0}")]
    Probe(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] chatwire_proto::ProtoError),
}
