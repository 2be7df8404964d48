//! Typed chat helpers over the transport.

use std::sync::Arc;

use chatwire_proto::chat::{CHAT_MESSAGE, NEW_MESSAGE, TYPING, TYPING_INDICATOR};
use chatwire_proto::{ChatMessage, NewMessage, ProtoError, TypingIndicator, TypingNotice};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ClientError;
use crate::transport::{handler, Handler, TransportClient};

/// A registered typed callback. Pass it back to
/// [`ChatChannel::unsubscribe`] to remove it.
#[derive(Clone)]
pub struct Subscription {
    message_type: &'static str,
    handler: Handler,
}

impl Subscription {
    /// Message type the callback listens to.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        self.message_type
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("message_type", &self.message_type)
            .finish_non_exhaustive()
    }
}

/// Chat operations on a shared transport.
#[derive(Debug, Clone)]
pub struct ChatChannel {
    transport: Arc<TransportClient>,
}

impl ChatChannel {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: Arc<TransportClient>) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<TransportClient> {
        &self.transport
    }

    /// Send a chat message to a conversation.
    pub fn send_message(
        &self,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), ClientError> {
        let message = ChatMessage {
            conversation_id: conversation_id.into(),
            content: content.into(),
        };
        self.transport.send(CHAT_MESSAGE, encode(&message)?)
    }

    /// Tell the conversation the user is typing.
    pub fn send_typing(&self, conversation_id: impl Into<String>) -> Result<(), ClientError> {
        let notice = TypingNotice {
            conversation_id: conversation_id.into(),
        };
        self.transport.send(TYPING, encode(&notice)?)
    }

    /// Call `f` for every incoming chat message.
    pub fn on_new_message<F>(&self, f: F) -> Subscription
    where
        F: Fn(NewMessage) + Send + Sync + 'static,
    {
        self.typed(NEW_MESSAGE, f)
    }

    /// Call `f` whenever someone starts typing in a conversation.
    pub fn on_typing<F>(&self, f: F) -> Subscription
    where
        F: Fn(TypingIndicator) + Send + Sync + 'static,
    {
        self.typed(TYPING_INDICATOR, f)
    }

    /// Remove a callback registered through this channel.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.transport
            .unsubscribe(subscription.message_type, &subscription.handler);
    }

    fn typed<T, F>(&self, message_type: &'static str, f: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = handler(move |payload: &Value| {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(value) => f(value),
                Err(e) => warn!(message_type, error = %e, "skipping undecodable payload"),
            }
        });
        self.transport.subscribe(message_type, Arc::clone(&handler));
        Subscription {
            message_type,
            handler,
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ProtoError::Encoding(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{NetworkStatus, NetworkStatusProvider};
    use crate::notice::TracingNotifier;
    use crate::session::{SessionGate, SessionStore};
    use crate::transport::TransportConfig;
    use serde_json::json;

    struct Healthy;

    impl NetworkStatusProvider for Healthy {
        fn network_status(&self) -> NetworkStatus {
            NetworkStatus::Healthy
        }
    }

    fn channel() -> ChatChannel {
        let transport = TransportClient::start(
            TransportConfig::default(),
            SessionGate::new(Arc::new(SessionStore::new())),
            Arc::new(Healthy),
            Arc::new(TracingNotifier),
        );
        ChatChannel::new(Arc::new(transport))
    }

    #[test]
    fn test_encode_chat_message() {
        let value = encode(&ChatMessage {
            conversation_id: "c1".to_string(),
            content: "hello".to_string(),
        })
        .expect("encode");
        assert_eq!(value, json!({"conversationId": "c1", "content": "hello"}));
    }

    #[tokio::test]
    async fn test_typed_subscription_register_and_remove() {
        let chat = channel();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let sub = chat.on_typing(move |t: TypingIndicator| s.lock().push(t.conversation_id));

        assert_eq!(sub.message_type(), TYPING_INDICATOR);
        assert_eq!(chat.transport().handler_count(TYPING_INDICATOR), 1);

        chat.unsubscribe(&sub);
        assert_eq!(chat.transport().handler_count(TYPING_INDICATOR), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_disconnected_queues() {
        let chat = channel();
        chat.send_message("c1", "hi").expect("send");
        chat.send_typing("c1").expect("send");

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while chat.transport().queued() < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queued");
    }
}
