//! Real-time transport.
//!
//! A single background task owns the WebSocket, the outbound queue, the
//! reconnect timer and the heartbeat. [`TransportClient`] is the handle to it.
//!
//! Status transitions:
//!
//! ```text
//! Idle -> Connecting -> Connected
//! Connected -> Reconnecting -> Connected      (abnormal close, retried forever)
//! any -> Disconnected                          (manual disconnect or close 1000)
//! ```

mod backoff;
mod client;
mod dispatch;
mod events;
mod heartbeat;
mod queue;
mod state;

pub use backoff::{Backoff, ReconnectConfig};
pub use client::{TransportClient, TransportConfig, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
pub use dispatch::{handler, Dispatcher, Handler};
pub use events::TransportEvent;
pub use heartbeat::HeartbeatConfig;
pub use queue::OutboundMessage;
pub use state::{AtomicConnectionStatus, ConnectionStatus};
