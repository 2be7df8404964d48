//! Transport event types.

use std::time::Duration;

/// Lifecycle events emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An attempt to open the socket started.
    Connecting {
        /// Attempt number since the last successful open, starting at 1.
        attempt: u32,
    },
    /// The socket is open and the queue was flushed.
    Connected {
        /// Frames flushed from the queue.
        flushed: usize,
    },
    /// The socket closed or an attempt failed.
    Closed {
        /// Close code, `1006` when the peer vanished without a close frame.
        code: u16,
        /// Close reason, if any.
        reason: String,
    },
    /// A reconnect is scheduled.
    Reconnecting {
        /// Consecutive failures so far, starting at 1.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Closed on purpose. No reconnect will happen.
    Disconnected,
}
