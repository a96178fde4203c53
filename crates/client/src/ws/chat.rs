//! Chat room channel: messages, presence and typing indicators.

use std::sync::Arc;

use qa_playground_shared::{ChatCommand, ChatFrame, ChatMessage, ChatUser};
use tokio::sync::watch;
use uuid::Uuid;

use super::channel::{use_websocket, SocketCallbacks, SocketChannel, SocketEndpoint};
use super::decode_message;
use crate::stores::ChatState;

/// Chat room on `/chat/{room_id}`.
pub struct ChatChannel {
    socket: SocketChannel,
    state: Arc<watch::Sender<ChatState>>,
}

pub fn use_chat(endpoint: SocketEndpoint, room_id: &str) -> ChatChannel {
    let (state, _) = watch::channel(ChatState::default());
    let state = Arc::new(state);

    let callbacks = SocketCallbacks::default().on_message({
        let state = Arc::clone(&state);
        move |message| {
            if let Some(frame) = decode_message::<ChatFrame>("chat", message) {
                state.send_modify(|s| s.apply(frame));
            }
        }
    });
    let socket = use_websocket(endpoint, format!("chat/{room_id}"), callbacks);

    ChatChannel { socket, state }
}

impl ChatChannel {
    /// Post a message. The server echoes it back as a `message` frame.
    pub fn send_message(&self, content: impl Into<String>) -> bool {
        self.socket.send_json(&ChatCommand::Message {
            content: content.into(),
            nonce: Uuid::new_v4().to_string(),
        })
    }

    pub fn send_typing(&self, is_typing: bool) -> bool {
        self.socket.send_json(&ChatCommand::Typing { is_typing })
    }

    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.borrow().messages.clone()
    }

    pub fn users(&self) -> Vec<ChatUser> {
        self.state.borrow().users.clone()
    }

    pub fn typing_users(&self) -> Vec<String> {
        self.state.borrow().typing.iter().cloned().collect()
    }

    pub fn socket(&self) -> &SocketChannel {
        &self.socket
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    pub fn teardown(&self) {
        self.socket.teardown();
    }
}
