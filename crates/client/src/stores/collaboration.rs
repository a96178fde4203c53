//! Presence, cursors and selections of a shared document.

use std::collections::BTreeMap;

use qa_playground_shared::{CollabFrame, Collaborator, CursorPosition, Selection};
use serde_json::Value;

/// A document edit forwarded to the editor; never reduced locally.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub user_id: Option<String>,
    pub change: Value,
}

/// Per-user state, keyed by user id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollaborationState {
    pub collaborators: BTreeMap<String, Collaborator>,
    pub cursors: BTreeMap<String, CursorPosition>,
    pub selections: BTreeMap<String, Selection>,
}

impl CollaborationState {
    /// Apply one frame. Document changes are handed back untouched.
    pub fn apply(&mut self, frame: CollabFrame) -> Option<DocumentChange> {
        match frame {
            CollabFrame::UserJoined { user } => {
                self.collaborators.insert(user.id.clone(), user);
            }
            CollabFrame::UserLeft { user_id } => self.remove(&user_id),
            CollabFrame::CursorMove { user_id, position } => {
                self.cursors.insert(user_id, position);
            }
            CollabFrame::SelectionChange { user_id, selection } => {
                self.selections.insert(user_id, selection);
            }
            CollabFrame::Collaborators { users } => {
                self.collaborators = users.into_iter().map(|u| (u.id.clone(), u)).collect();
                let present = &self.collaborators;
                self.cursors.retain(|id, _| present.contains_key(id));
                self.selections.retain(|id, _| present.contains_key(id));
            }
            CollabFrame::DocumentChange { user_id, change } => {
                return Some(DocumentChange { user_id, change });
            }
        }
        None
    }

    fn remove(&mut self, user_id: &str) {
        self.collaborators.remove(user_id);
        self.cursors.remove(user_id);
        self.selections.remove(user_id);
    }
}
