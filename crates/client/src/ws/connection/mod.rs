//! Transport layer under a [`SocketChannel`](super::SocketChannel).
//!
//! A [`Connector`] opens one connection and hands back a [`SocketConnection`]:
//! a sender for outgoing frames and a receiver of transport events. The
//! channel owns everything above that (state machine, heartbeat, reconnect).

use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::UnboundedSender;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

mod connection_native;
#[cfg(test)]
pub(crate) mod mock;

pub use connection_native::TungsteniteConnector;

pub const NORMAL_CLOSURE: u16 = 1000;
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Connection state, mirroring the WebSocket `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub fn is_open(&self) -> bool {
        matches!(self, ReadyState::Open)
    }
}

/// Payload delivered to a channel's message callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    /// The frame parsed as JSON.
    Json(Value),
    /// Raw frame text that is not JSON.
    Text(String),
}

impl SocketMessage {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            SocketMessage::Json(value) => Some(value),
            SocketMessage::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Connection dropped without a close frame.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    pub fn was_clean(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

/// Event raised by an open transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(String),
    Error(String),
    /// Always the last event of a connection.
    Closed(CloseInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Both ends of one open connection, as seen by the channel.
pub struct SocketConnection {
    pub outgoing: UnboundedSender<OutboundFrame>,
    pub incoming: UnboundedReceiver<TransportEvent>,
}

/// Opens WebSocket connections.
///
/// `connect` resolves once the connection is open; an error means it never
/// opened.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> anyhow::Result<SocketConnection>;
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnect attempts
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub interval: Duration,
    /// Upper bound for the delay
    pub max_delay: Duration,
    /// Growth factor between attempts (1.0 keeps the delay fixed)
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = f64::from(self.backoff_multiplier.max(1.0)).powi(exponent);
        let secs = self.interval.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}
