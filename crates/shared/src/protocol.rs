//! WebSocket frame definitions.
//!
//! Every frame is a JSON object carrying a `type` discriminator. Each channel
//! kind has its own closed set of inbound frames (server → client) and
//! commands (client → server); a frame whose `type` is outside that set fails
//! to decode and is ignored by the receiving channel.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    ChatMessage, ChatUser, Collaborator, CursorPosition, Notification, Selection,
};

/// Heartbeat frames exchanged on every open socket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Heartbeat {
    Ping,
    Pong,
}

/// Whether a decoded JSON payload is a heartbeat reply.
pub fn is_pong(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("pong")
}

/// Decode a typed frame from an already parsed JSON payload.
pub fn decode_frame<F: DeserializeOwned>(value: &Value) -> Result<F, serde_json::Error> {
    F::deserialize(value)
}

// --- Chat ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChatFrame {
    Message {
        message: ChatMessage,
    },
    UserJoined {
        user: ChatUser,
    },
    UserLeft {
        user_id: String,
    },
    Typing {
        user_id: String,
        is_typing: bool,
    },
    History {
        messages: Vec<ChatMessage>,
        #[serde(default)]
        users: Vec<ChatUser>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChatCommand {
    Message { content: String, nonce: String },
    Typing { is_typing: bool },
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NotificationFrame {
    Notification { notification: Notification },
    NotificationRead { notification_id: String },
    NotificationHistory { notifications: Vec<Notification> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NotificationCommand {
    MarkRead { notification_id: String },
    MarkAllRead,
}

// --- Collaboration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CollabFrame {
    UserJoined {
        user: Collaborator,
    },
    UserLeft {
        user_id: String,
    },
    CursorMove {
        user_id: String,
        position: CursorPosition,
    },
    SelectionChange {
        user_id: String,
        selection: Selection,
    },
    Collaborators {
        users: Vec<Collaborator>,
    },
    DocumentChange {
        #[serde(default)]
        user_id: Option<String>,
        change: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CollabCommand {
    CursorMove { position: CursorPosition },
    SelectionChange { selection: Selection },
    DocumentChange { change: Value },
}

// --- Live data ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveDataFrame {
    Data { data: Value },
    Snapshot { data: Vec<Value> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_wire_shape() {
        assert_eq!(serde_json::to_value(Heartbeat::Ping).unwrap(), json!({"type": "ping"}));
        assert!(is_pong(&json!({"type": "pong"})));
        assert!(!is_pong(&json!({"type": "message"})));
        assert!(!is_pong(&json!("pong")));
    }

    #[test]
    fn chat_frames_decode_with_camel_case_fields() {
        let frame: ChatFrame =
            decode_frame(&json!({"type": "typing", "userId": "u1", "isTyping": true})).unwrap();
        assert_eq!(
            frame,
            ChatFrame::Typing {
                user_id: "u1".to_string(),
                is_typing: true
            }
        );
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result: Result<ChatFrame, _> = decode_frame(&json!({"type": "reaction", "emoji": "+1"}));
        assert!(result.is_err());
    }

    #[test]
    fn commands_encode_type_tag() {
        let cmd = NotificationCommand::MarkRead {
            notification_id: "n1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(cmd).unwrap(),
            json!({"type": "mark_read", "notificationId": "n1"})
        );
        assert_eq!(
            serde_json::to_value(NotificationCommand::MarkAllRead).unwrap(),
            json!({"type": "mark_all_read"})
        );
    }

    #[test]
    fn document_change_without_user() {
        let frame: CollabFrame =
            decode_frame(&json!({"type": "document_change", "change": {"insert": "a"}})).unwrap();
        assert_eq!(
            frame,
            CollabFrame::DocumentChange {
                user_id: None,
                change: json!({"insert": "a"})
            }
        );
    }
}
