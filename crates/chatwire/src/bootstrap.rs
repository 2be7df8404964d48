//! Start-up ordering.
//!
//! The health monitor must finish its first probe before anything that
//! talks to the server runs. Steps that need the server are only attempted
//! once the network is healthy.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::health::HealthMonitor;

/// Result of one initialization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    /// Everything initialized.
    Ready,
    /// Initialization stopped. Calling `initialize` again retries.
    Error {
        /// What to show the user.
        message: String,
    },
}

impl InitStatus {
    /// Whether initialization completed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// A server-dependent start-up step, such as registering the device.
pub trait InitStep: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the step. The error string is shown to the user.
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>>;
}

/// Runs the start-up sequence.
pub struct Bootstrap {
    monitor: Arc<HealthMonitor>,
    steps: Vec<Arc<dyn InitStep>>,
}

impl Bootstrap {
    /// Create a bootstrap over `monitor`.
    #[must_use]
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self {
            monitor,
            steps: Vec::new(),
        }
    }

    /// Add a step that runs after the network is confirmed healthy.
    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn InitStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run (or re-run) initialization.
    pub async fn initialize(&self) -> InitStatus {
        info!("initializing");

        let healthy = if self.monitor.is_started() {
            self.monitor.check_connection().await
        } else {
            self.monitor.start().await
        };

        if !healthy {
            let message = self
                .monitor
                .describe()
                .unwrap_or("Cannot connect to server.")
                .to_string();
            warn!(status = %self.monitor.network_status(), "network not ready, skipping start-up steps");
            return InitStatus::Error { message };
        }

        for step in &self.steps {
            if let Err(message) = step.run().await {
                error!(step = step.name(), error = %message, "start-up step failed");
                return InitStatus::Error { message };
            }
            info!(step = step.name(), "start-up step done");
        }

        info!("ready");
        InitStatus::Ready
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::connectivity::ManualConnectivity;
    use crate::health::{HealthConfig, HealthProbe, ProbeOutcome};
    use crate::notice::TracingNotifier;

    struct ScriptedProbe(Mutex<VecDeque<ProbeOutcome>>);

    impl HealthProbe for ScriptedProbe {
        fn probe(&self) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + '_>> {
            let outcome = self.0.lock().pop_front().unwrap_or(ProbeOutcome::Healthy);
            Box::pin(async move { outcome })
        }
    }

    struct CountingStep {
        runs: AtomicUsize,
        result: Result<(), String>,
    }

    impl CountingStep {
        fn new(result: Result<(), String>) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                result,
            })
        }
    }

    impl InitStep for CountingStep {
        fn name(&self) -> &str {
            "register-device"
        }

        fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }

    fn monitor(outcomes: Vec<ProbeOutcome>) -> Arc<HealthMonitor> {
        Arc::new(HealthMonitor::new(
            Arc::new(ScriptedProbe(Mutex::new(outcomes.into()))),
            Arc::new(ManualConnectivity::new(true)),
            Arc::new(TracingNotifier),
            HealthConfig {
                probe_timeout: Duration::from_millis(200),
                poll_interval: Duration::from_secs(3600),
            },
        ))
    }

    #[tokio::test]
    async fn test_ready_when_healthy() {
        let step = CountingStep::new(Ok(()));
        let bootstrap = Bootstrap::new(monitor(vec![ProbeOutcome::Healthy])).with_step(step.clone());

        assert_eq!(bootstrap.initialize().await, InitStatus::Ready);
        assert_eq!(step.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_steps_skipped_when_unhealthy() {
        let step = CountingStep::new(Ok(()));
        let bootstrap = Bootstrap::new(monitor(vec![ProbeOutcome::Unhealthy { status: 503 }]))
            .with_step(step.clone());

        let status = bootstrap.initialize().await;

        assert_eq!(
            status,
            InitStatus::Error {
                message: "Server is currently unavailable.".to_string()
            }
        );
        assert_eq!(step.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_after_recovery() {
        let step = CountingStep::new(Ok(()));
        let monitor = monitor(vec![ProbeOutcome::Unreachable {
            reason: "health check timeout".to_string(),
        }]);
        let bootstrap = Bootstrap::new(Arc::clone(&monitor)).with_step(step.clone());

        assert!(!bootstrap.initialize().await.is_ready());
        assert!(monitor.is_started());

        // The scripted probe now reports healthy.
        assert!(bootstrap.initialize().await.is_ready());
        assert_eq!(step.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_step_reports_its_message() {
        let first = CountingStep::new(Err("Unable to register device".to_string()));
        let second = CountingStep::new(Ok(()));
        let bootstrap = Bootstrap::new(monitor(vec![]))
            .with_step(first.clone())
            .with_step(second.clone());

        assert_eq!(
            bootstrap.initialize().await,
            InitStatus::Error {
                message: "Unable to register device".to_string()
            }
        );
        assert_eq!(second.runs.load(Ordering::SeqCst), 0);
    }
}
