//! Chat payloads carried inside frames.
//!
//! One connection multiplexes every conversation; the conversation a frame
//! belongs to travels inside its payload.

use serde::{Deserialize, Serialize};

/// Frame type for an outbound chat message.
pub const CHAT_MESSAGE: &str = "chat_message";
/// Frame type for an outbound typing notice.
pub const TYPING: &str = "typing";
/// Frame type for an inbound chat message.
pub const NEW_MESSAGE: &str = "new_message";
/// Frame type for an inbound typing indicator.
pub const TYPING_INDICATOR: &str = "typing_indicator";

/// Payload of a `chat_message` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Target conversation.
    pub conversation_id: String,
    /// Message text.
    pub content: String,
}

/// Payload of a `typing` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// Conversation the user is typing in.
    pub conversation_id: String,
}

/// Payload of a `new_message` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Server-assigned message ID.
    pub id: String,
    /// Conversation the message belongs to.
    pub chat_id: String,
    /// Author ID.
    pub sender_id: String,
    /// Author display name.
    #[serde(default)]
    pub sender_name: String,
    /// Message text.
    pub content: String,
    /// Server timestamp, as sent.
    #[serde(default)]
    pub timestamp: String,
}

/// Payload of a `typing_indicator` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicator {
    /// Conversation someone is typing in.
    pub conversation_id: String,
    /// Who is typing.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_uses_camel_case() {
        let msg = ChatMessage {
            conversation_id: "c42".to_string(),
            content: "hello".to_string(),
        };
        let value = serde_json::to_value(&msg).expect("encode");
        assert_eq!(value, json!({"conversationId": "c42", "content": "hello"}));
    }

    #[test]
    fn test_new_message_optional_fields_default() {
        let msg: NewMessage = serde_json::from_value(json!({
            "id": "m1",
            "chatId": "c1",
            "senderId": "u7",
            "content": "yo"
        }))
        .expect("decode");
        assert_eq!(msg.sender_name, "");
        assert_eq!(msg.timestamp, "");
    }

    #[test]
    fn test_typing_indicator_without_user() {
        let ind: TypingIndicator =
            serde_json::from_value(json!({"conversationId": "c1"})).expect("decode");
        assert_eq!(ind.conversation_id, "c1");
        assert!(ind.user_id.is_none());
    }
}
