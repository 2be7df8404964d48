//! chatwire - real-time client plumbing for chat applications
//!
//! This crate provides:
//! - An auto-reconnecting WebSocket transport with an outbound queue,
//!   heartbeat and per-type message dispatch ([`transport`])
//! - A network health monitor driven by connectivity events and HTTP
//!   probes ([`health`])
//! - Session gating, user-facing notices and start-up ordering
//!
//! Nothing here is global: construct a [`HealthMonitor`] and a
//! [`TransportClient`], inject their collaborators, and tear them down with
//! [`HealthMonitor::stop`] and [`TransportClient::shutdown`].

pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod health;
pub mod notice;
pub mod session;
pub mod transport;

pub use bootstrap::{Bootstrap, InitStatus, InitStep};
pub use chat::{ChatChannel, Subscription};
pub use config::ClientConfig;
pub use connectivity::{ConnectivitySignal, ManualConnectivity};
pub use error::{ClientError, ConnectRefusal};
pub use health::{HealthMonitor, HttpProbe, NetworkState, NetworkStatus, NetworkStatusProvider};
pub use notice::{BroadcastNotifier, Notice, NoticeKind, Notifier, TracingNotifier};
pub use session::{Session, SessionGate, SessionProvider, SessionStore, User};
pub use transport::{handler, ConnectionStatus, Handler, TransportClient, TransportEvent};
