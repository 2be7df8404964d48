//! Network health monitoring.
//!
//! Combines the OS connectivity signal with periodic probes of the chat
//! server's health endpoint into a single [`NetworkStatus`].

mod monitor;
mod probe;
mod status;

pub use monitor::{HealthConfig, HealthMonitor, NetworkStatusProvider};
pub use probe::{HealthProbe, HttpProbe, ProbeOutcome};
pub use status::{NetworkState, NetworkStatus};
