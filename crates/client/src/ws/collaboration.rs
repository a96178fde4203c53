//! Shared-document channel: collaborators, cursors and selections.

use std::collections::BTreeMap;
use std::sync::Arc;

use qa_playground_shared::{CollabCommand, CollabFrame, Collaborator, CursorPosition, Selection};
use serde_json::Value;
use tokio::sync::watch;

use super::channel::{use_websocket, SocketCallbacks, SocketChannel, SocketEndpoint};
use super::decode_message;
use crate::stores::collaboration::DocumentChange;
use crate::stores::CollaborationState;

pub type DocumentChangeCallback = Arc<dyn Fn(&DocumentChange) + Send + Sync>;

/// Co-editing session on `/collaborate/{document_id}`.
pub struct CollaborationChannel {
    socket: SocketChannel,
    state: Arc<watch::Sender<CollaborationState>>,
}

/// Join a document. Remote edits go to `on_document_change`; they are not
/// applied to any local state.
pub fn use_collaboration(
    endpoint: SocketEndpoint,
    document_id: &str,
    on_document_change: Option<DocumentChangeCallback>,
) -> CollaborationChannel {
    let (state, _) = watch::channel(CollaborationState::default());
    let state = Arc::new(state);

    let callbacks = SocketCallbacks::default().on_message({
        let state = Arc::clone(&state);
        move |message| {
            let Some(frame) = decode_message::<CollabFrame>("collaboration", message) else {
                return;
            };
            let mut forwarded = None;
            state.send_if_modified(|s| {
                let before = s.clone();
                forwarded = s.apply(frame);
                *s != before
            });
            if let (Some(change), Some(callback)) = (forwarded, on_document_change.as_ref()) {
                callback(&change);
            }
        }
    });
    let socket = use_websocket(endpoint, format!("collaborate/{document_id}"), callbacks);

    CollaborationChannel { socket, state }
}

impl CollaborationChannel {
    pub fn send_cursor(&self, position: CursorPosition) -> bool {
        self.socket.send_json(&CollabCommand::CursorMove { position })
    }

    pub fn send_selection(&self, selection: Selection) -> bool {
        self.socket.send_json(&CollabCommand::SelectionChange { selection })
    }

    pub fn send_change(&self, change: Value) -> bool {
        self.socket.send_json(&CollabCommand::DocumentChange { change })
    }

    pub fn collaborators(&self) -> Vec<Collaborator> {
        self.state.borrow().collaborators.values().cloned().collect()
    }

    pub fn cursors(&self) -> BTreeMap<String, CursorPosition> {
        self.state.borrow().cursors.clone()
    }

    pub fn selections(&self) -> BTreeMap<String, Selection> {
        self.state.borrow().selections.clone()
    }

    pub fn state(&self) -> CollaborationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollaborationState> {
        self.state.subscribe()
    }

    pub fn socket(&self) -> &SocketChannel {
        &self.socket
    }

    pub fn teardown(&self) {
        self.socket.teardown();
    }
}
