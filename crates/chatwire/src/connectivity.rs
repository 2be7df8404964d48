//! OS-level connectivity signal.
//!
//! The host platform knows when the machine goes on- or offline; the health
//! monitor only listens.

use tokio::sync::watch;

/// Source of online/offline transitions.
pub trait ConnectivitySignal: Send + Sync {
    /// Whether the OS currently reports a network.
    fn is_online(&self) -> bool;

    /// Receiver that observes every transition.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Connectivity signal driven by the embedding application.
#[derive(Debug)]
pub struct ManualConnectivity {
    tx: watch::Sender<bool>,
}

impl ManualConnectivity {
    /// Create a signal with the given initial value.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Report a transition. Repeating the current value is ignored.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySignal for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
