//! # chatwire-proto
//!
//! Wire format shared by the chatwire client and the chat server.
//!
//! Every WebSocket text frame, in both directions, is a JSON object of the
//! shape `{"type": ..., "payload": ..., "timestamp": ...}`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod frame;

pub use chat::{ChatMessage, NewMessage, TypingIndicator, TypingNotice};
pub use error::ProtoError;
pub use frame::{Frame, InboundEnvelope, PING, PONG};
