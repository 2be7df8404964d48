//! Network health monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::connectivity::ConnectivitySignal;
use crate::notice::{Notice, Notifier};

use super::probe::{HealthProbe, ProbeOutcome};
use super::status::{NetworkState, NetworkStatus};

/// Configuration for health monitoring.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Upper bound for a single probe.
    pub probe_timeout: Duration,
    /// Interval of the passive poll.
    pub poll_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Read access to the current network status.
///
/// The transport consults this once per connect request.
pub trait NetworkStatusProvider: Send + Sync {
    /// Current status.
    fn network_status(&self) -> NetworkStatus;
}

struct Inner {
    probe: Arc<dyn HealthProbe>,
    connectivity: Arc<dyn ConnectivitySignal>,
    notifier: Arc<dyn Notifier>,
    config: HealthConfig,
    state: watch::Sender<NetworkState>,
}

impl Inner {
    async fn check_connection(&self) -> bool {
        let outcome = match timeout(self.config.probe_timeout, self.probe.probe()).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::Unreachable {
                reason: "health check timeout".to_string(),
            },
        };

        let healthy = outcome == ProbeOutcome::Healthy;
        match &outcome {
            ProbeOutcome::Healthy => debug!("health check succeeded"),
            ProbeOutcome::Unhealthy { status } => {
                error!(status, "server returned error");
            }
            ProbeOutcome::Unreachable { reason } => {
                error!(reason = %reason, "no response from server");
            }
        }

        self.state.send_modify(|state| {
            state.status = match outcome {
                ProbeOutcome::Healthy => NetworkStatus::Healthy,
                // No network, so the probe failure says nothing about the server.
                _ if !state.browser_online => NetworkStatus::Offline,
                ProbeOutcome::Unhealthy { .. } => NetworkStatus::Unhealthy,
                ProbeOutcome::Unreachable { .. } => NetworkStatus::Unreachable,
            };
            state.server_reachable = healthy;
            state.last_check = Some(Utc::now());
        });

        healthy
    }

    /// Record the connectivity signal without notices or probes.
    fn set_online(&self, online: bool) {
        self.state.send_modify(|state| {
            state.browser_online = online;
            if !online {
                state.server_reachable = false;
                state.status = NetworkStatus::Offline;
            } else if state.status == NetworkStatus::Offline {
                state.status = NetworkStatus::Connecting;
            }
        });
    }

    async fn went_online(&self) {
        info!("network went online");
        self.set_online(true);
        self.notifier
            .notify(Notice::success("Network connection restored"));
        self.check_connection().await;
    }

    fn went_offline(&self) {
        info!("network went offline");
        self.set_online(false);
        self.notifier.notify(Notice::error("Network connection lost"));
    }
}

/// Watches connectivity events and probes the server's health endpoint.
///
/// The monitor is the only writer of [`NetworkState`]; everyone else reads
/// snapshots or subscribes to changes.
pub struct HealthMonitor {
    inner: Arc<Inner>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor. Nothing runs until [`HealthMonitor::start`].
    #[must_use]
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        connectivity: Arc<dyn ConnectivitySignal>,
        notifier: Arc<dyn Notifier>,
        config: HealthConfig,
    ) -> Self {
        let (state, _) = watch::channel(NetworkState::initial(connectivity.is_online()));
        Self {
            inner: Arc::new(Inner {
                probe,
                connectivity,
                notifier,
                config,
                state,
            }),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to connectivity events, start passive polling and run the
    /// first probe to completion.
    ///
    /// Calling it again on a started monitor only reports the current status.
    pub async fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return self.network_status().is_healthy();
        }

        let events = {
            let inner = Arc::clone(&self.inner);
            let mut rx = inner.connectivity.watch();
            // The signal may have moved since construction.
            let online = *rx.borrow_and_update();
            let recorded = inner.state.borrow().browser_online;
            if online != recorded {
                debug!(online, "connectivity changed before start");
                inner.set_online(online);
            }
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let online = *rx.borrow_and_update();
                    if online {
                        inner.went_online().await;
                    } else {
                        inner.went_offline();
                    }
                }
            })
        };

        let poll = {
            let inner = Arc::clone(&self.inner);
            let period = inner.config.poll_interval;
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !inner.connectivity.is_online() {
                        debug!("skipping health poll while offline");
                        continue;
                    }
                    inner.check_connection().await;
                }
            })
        };

        self.tasks.lock().extend([events, poll]);

        info!("checking initial connection");
        let healthy = self.inner.check_connection().await;
        if !healthy {
            self.inner.notifier.notify(
                Notice::error("Failed to connect to server")
                    .with_description("Please check your internet connection and try again"),
            );
        }
        healthy
    }

    /// Stop event handling and polling.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// Probe the server once and update the state.
    pub async fn check_connection(&self) -> bool {
        self.inner.check_connection().await
    }

    /// User-triggered probe with progress and outcome notices.
    pub async fn recheck(&self) -> bool {
        let notifier = &self.inner.notifier;
        notifier.notify(Notice::info("Checking network connection..."));

        let healthy = self.inner.check_connection().await;
        if healthy {
            notifier.notify(Notice::success("Network connection restored"));
        } else {
            notifier.notify(Notice::error("Cannot connect to server"));
        }
        healthy
    }

    /// Current network status.
    #[must_use]
    pub fn network_status(&self) -> NetworkStatus {
        self.inner.state.borrow().status
    }

    /// Snapshot of the full state.
    #[must_use]
    pub fn state(&self) -> NetworkState {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.inner.state.subscribe()
    }

    /// User-facing description of the current state.
    #[must_use]
    pub fn describe(&self) -> Option<&'static str> {
        self.inner.state.borrow().describe()
    }

    /// Whether [`HealthMonitor::start`] has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl NetworkStatusProvider for HealthMonitor {
    fn network_status(&self) -> NetworkStatus {
        Self::network_status(self)
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
