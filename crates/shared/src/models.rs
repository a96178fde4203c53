//! Shared data models exchanged with the playground backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Pagination ---

/// A page of results as returned by list endpoints.
///
/// Endpoints either answer with a bare JSON array or with an object holding
/// the items plus an optional `hasNext` flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PageResponse<T> {
    Items(Vec<T>),
    Page {
        #[serde(alias = "items")]
        data: Vec<T>,
        #[serde(rename = "hasNext", default, skip_serializing_if = "Option::is_none")]
        has_next: Option<bool>,
    },
}

impl<T> PageResponse<T> {
    /// Split into the page items and the explicit `hasNext` flag, if any.
    pub fn into_parts(self) -> (Vec<T>, Option<bool>) {
        match self {
            PageResponse::Items(items) => (items, None),
            PageResponse::Page { data, has_next } => (data, has_next),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PageResponse::Items(items) => items.len(),
            PageResponse::Page { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- Chat ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// --- Collaboration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: CursorPosition,
    pub end: CursorPosition,
}
