//! Frame definitions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtoError;

/// Client-to-server liveness probe.
pub const PING: &str = "ping";

/// Server-to-client liveness acknowledgement.
pub const PONG: &str = "pong";

/// A frame as it travels over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// Message type tag used for routing.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Application payload, opaque to the transport.
    #[serde(default)]
    pub payload: Value,
    /// Milliseconds since the Unix epoch at transmission time.
    pub timestamp: i64,
}

impl Frame {
    /// Create a frame stamped with the current time.
    #[must_use]
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Create a heartbeat frame.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(PING, Value::Null)
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encoding(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(json).map_err(|e| ProtoError::Decoding(e.to_string()))
    }
}

/// The part of an inbound frame the client routes on.
///
/// The sender's timestamp and any unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InboundEnvelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Application payload.
    #[serde(default)]
    pub payload: Value,
}

impl InboundEnvelope {
    /// Parse an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object with a non-empty
    /// string `type` field.
    pub fn from_json(json: &str) -> Result<Self, ProtoError> {
        let envelope: Self =
            serde_json::from_str(json).map_err(|e| ProtoError::Decoding(e.to_string()))?;
        if envelope.message_type.is_empty() {
            return Err(ProtoError::MissingField("type"));
        }
        Ok(envelope)
    }

    /// Whether this is a liveness control frame.
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.message_type == PING || self.message_type == PONG
    }
}
