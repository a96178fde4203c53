//! Reducers for the state of the derived WebSocket channels.
//!
//! Each store is plain data plus an `apply` taking one decoded frame; the
//! channels in [`crate::ws`] own them behind a watch channel.

pub mod chat;
pub mod collaboration;
pub mod live_data;
pub mod notifications;

pub use chat::ChatState;
pub use collaboration::CollaborationState;
pub use live_data::LiveDataState;
pub use notifications::NotificationState;
