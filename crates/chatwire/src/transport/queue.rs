//! Outbound message queue.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A message waiting to be transmitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Frame type.
    pub message_type: String,
    /// Frame payload.
    pub payload: Value,
    /// When `send` was called.
    pub enqueued_at: DateTime<Utc>,
}

impl OutboundMessage {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }

    /// Milliseconds spent waiting so far.
    #[must_use]
    pub fn waited_ms(&self) -> i64 {
        (Utc::now() - self.enqueued_at).num_milliseconds()
    }
}

/// Unbounded FIFO of messages sent while the socket was not open.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    messages: VecDeque<OutboundMessage>,
}

impl OutboundQueue {
    pub(crate) fn push_back(&mut self, message: OutboundMessage) {
        self.messages.push_back(message);
    }

    /// Put a message back at the head, ahead of everything queued.
    pub(crate) fn push_front(&mut self, message: OutboundMessage) {
        self.messages.push_front(message);
    }

    pub(crate) fn pop_front(&mut self) -> Option<OutboundMessage> {
        self.messages.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }
}
