//! User-facing notices.
//!
//! Notices are what the UI shows as toasts. Diagnostics go through
//! `tracing` instead.

use tokio::sync::broadcast;
use tracing::{error, info};

/// Kind of notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Something recovered or succeeded.
    Success,
    /// Something the user must act on.
    Error,
    /// Progress or neutral information.
    Info,
}

/// A notice for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Kind.
    pub kind: NoticeKind,
    /// Headline.
    pub message: String,
    /// Optional second line.
    pub description: Option<String>,
}

impl Notice {
    /// Success notice.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    /// Error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    /// Info notice.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }

    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            description: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sink for user-facing notices.
pub trait Notifier: Send + Sync {
    /// Show a notice.
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let description = notice.description.as_deref().unwrap_or("");
        match notice.kind {
            NoticeKind::Error => error!(description, "{}", notice.message),
            NoticeKind::Success | NoticeKind::Info => info!(description, "{}", notice.message),
        }
    }
}

/// Notifier that fans notices out to any number of UI subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` notices per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_constructors() {
        let n = Notice::error("Failed to connect to server")
            .with_description("Please check your internet connection and try again");
        assert_eq!(n.kind, NoticeKind::Error);
        assert_eq!(n.message, "Failed to connect to server");
        assert_eq!(
            n.description.as_deref(),
            Some("Please check your internet connection and try again")
        );

        assert_eq!(Notice::success("ok").kind, NoticeKind::Success);
        assert_eq!(Notice::info("hm").kind, NoticeKind::Info);
    }

    #[tokio::test]
    async fn test_broadcast_notifier_delivers() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();

        notifier.notify(Notice::info("Checking network connection..."));

        let got = rx.recv().await.expect("notice");
        assert_eq!(got.message, "Checking network connection...");
    }

    #[test]
    fn test_broadcast_notifier_without_subscribers() {
        BroadcastNotifier::default().notify(Notice::error("nobody listens"));
    }

    #[test]
    fn test_tracing_notifier_does_not_panic() {
        TracingNotifier.notify(Notice::error("boom").with_description("details"));
        TracingNotifier.notify(Notice::success("fine"));
    }
}
