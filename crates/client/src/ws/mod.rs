//! WebSocket channels.
//!
//! [`SocketChannel`] owns one connection: state machine, heartbeat,
//! auto-reconnect and auth-driven auto-connect. The derived channels route
//! its `type`-tagged JSON frames into the reducers of [`crate::stores`]:
//!
//! ```text
//!   use_chat ──────────┐
//!   use_notifications ─┤                      ┌─ TungsteniteConnector
//!   use_collaboration ─┼─▶ SocketChannel ─▶ Connector
//!   use_live_data ─────┘                      └─ (test) MockConnector
//! ```

mod channel;
mod chat;
mod collaboration;
mod connection;
mod live_data;
mod notifications;

use std::time::Duration;

use serde::de::DeserializeOwned;

use qa_playground_shared::decode_frame;

pub use channel::{
    build_socket_url, use_websocket, SocketCallbacks, SocketChannel, SocketEndpoint,
    SocketOptions, MANUAL_RECONNECT_DELAY,
};
pub use chat::{use_chat, ChatChannel};
pub use collaboration::{use_collaboration, CollaborationChannel, DocumentChangeCallback};
pub use connection::{
    CloseInfo, Connector, OutboundFrame, ReadyState, ReconnectConfig, SocketConnection,
    SocketMessage, TransportEvent, TungsteniteConnector, ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
pub use live_data::{use_live_data, LiveDataChannel, LiveDataOptions};
pub use notifications::{use_notifications, NotificationChannel, NotificationOptions};

/// Shortest period of the heartbeat and flush timers.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Decode a typed frame. Raw text and unknown `type`s yield `None`.
fn decode_message<F: DeserializeOwned>(label: &str, message: &SocketMessage) -> Option<F> {
    let value = message.as_json()?;
    match decode_frame(value) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!("{}: ignoring frame: {}", label, e);
            None
        }
    }
}
