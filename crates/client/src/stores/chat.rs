//! Chat room state.

use std::collections::BTreeSet;

use qa_playground_shared::{ChatFrame, ChatMessage, ChatUser};

/// Messages, members and typing indicators of one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Sorted by timestamp ascending.
    pub messages: Vec<ChatMessage>,
    pub users: Vec<ChatUser>,
    /// Ids of users currently typing.
    pub typing: BTreeSet<String>,
}

impl ChatState {
    pub fn apply(&mut self, frame: ChatFrame) {
        match frame {
            ChatFrame::Message { message } => {
                self.add_message(message);
            }
            ChatFrame::UserJoined { user } => match self.users.iter_mut().find(|u| u.id == user.id) {
                Some(existing) => *existing = user,
                None => self.users.push(user),
            },
            ChatFrame::UserLeft { user_id } => {
                self.users.retain(|u| u.id != user_id);
                self.typing.remove(&user_id);
            }
            ChatFrame::Typing { user_id, is_typing } => {
                if is_typing {
                    self.typing.insert(user_id);
                } else {
                    self.typing.remove(&user_id);
                }
            }
            ChatFrame::History { messages, users } => self.set_history(messages, users),
        }
    }

    /// Add a message, keeping timestamp order.
    /// Returns false if a message with the same id already exists.
    pub fn add_message(&mut self, msg: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == msg.id) {
            return false;
        }
        let pos = self.messages.partition_point(|m| m.timestamp <= msg.timestamp);
        self.messages.insert(pos, msg);
        true
    }

    /// Replace the whole room state.
    pub fn set_history(&mut self, mut messages: Vec<ChatMessage>, users: Vec<ChatUser>) {
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        messages.dedup_by(|a, b| a.id == b.id);
        self.messages = messages;
        self.users = users;
        self.typing.clear();
    }

    pub fn user(&self, id: &str) -> Option<&ChatUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn is_typing(&self, user_id: &str) -> bool {
        self.typing.contains(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            user_id: "u1".to_string(),
            content: format!("message {id}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn user(id: &str, name: &str) -> ChatUser {
        ChatUser {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn messages_are_deduplicated_and_ordered() {
        let mut state = ChatState::default();
        state.apply(ChatFrame::Message { message: msg("b", 20) });
        state.apply(ChatFrame::Message { message: msg("a", 10) });
        state.apply(ChatFrame::Message { message: msg("b", 20) });

        let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn history_replaces_everything() {
        let mut state = ChatState::default();
        state.apply(ChatFrame::Message { message: msg("old", 1) });
        state.apply(ChatFrame::Typing {
            user_id: "u9".to_string(),
            is_typing: true,
        });

        state.apply(ChatFrame::History {
            messages: vec![msg("y", 5), msg("x", 3)],
            users: vec![user("u1", "Ada")],
        });

        let ids: Vec<&str> = state.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(state.users, vec![user("u1", "Ada")]);
        assert!(state.typing.is_empty());
    }

    #[test]
    fn membership_and_typing() {
        let mut state = ChatState::default();
        state.apply(ChatFrame::UserJoined { user: user("u1", "Ada") });
        state.apply(ChatFrame::UserJoined { user: user("u1", "Ada L.") });
        state.apply(ChatFrame::UserJoined { user: user("u2", "Bob") });
        assert_eq!(state.users.len(), 2);
        assert_eq!(state.user("u1").map(|u| u.name.as_str()), Some("Ada L."));

        state.apply(ChatFrame::Typing {
            user_id: "u2".to_string(),
            is_typing: true,
        });
        assert!(state.is_typing("u2"));

        state.apply(ChatFrame::UserLeft {
            user_id: "u2".to_string(),
        });
        assert!(state.user("u2").is_none());
        assert!(!state.is_typing("u2"));
    }
}
