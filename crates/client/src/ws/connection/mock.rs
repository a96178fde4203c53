//! In-memory transport for channel tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use super::{CloseInfo, Connector, OutboundFrame, SocketConnection, TransportEvent};

#[derive(Default)]
struct MockState {
    urls: Vec<String>,
    failures: usize,
}

/// Opens in-memory connections and hands their server side to the test
/// through [`MockAcceptor::accept`].
#[derive(Clone)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
    accepted: UnboundedSender<MockServer>,
}

pub(crate) struct MockAcceptor {
    servers: tokio::sync::mpsc::UnboundedReceiver<MockServer>,
}

pub(crate) fn mock_connector() -> (MockConnector, MockAcceptor) {
    let (accepted, servers) = unbounded_channel();
    (
        MockConnector {
            state: Arc::new(Mutex::new(MockState::default())),
            accepted,
        },
        MockAcceptor { servers },
    )
}

impl MockConnector {
    /// Make the next `count` connect attempts fail before opening.
    pub(crate) fn fail_next(&self, count: usize) {
        self.state.lock().failures = count;
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.lock().urls.len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<SocketConnection> {
        {
            let mut state = self.state.lock();
            state.urls.push(url.to_string());
            if state.failures > 0 {
                state.failures -= 1;
                anyhow::bail!("connection refused");
            }
        }

        let (outgoing, frames) = unbounded();
        let (events, incoming) = unbounded_channel();
        let _ = self.accepted.send(MockServer { frames, events });
        Ok(SocketConnection { outgoing, incoming })
    }
}

impl MockAcceptor {
    pub(crate) async fn accept(&mut self) -> MockServer {
        self.servers.recv().await.expect("connector dropped")
    }

    pub(crate) fn try_accept(&mut self) -> Option<MockServer> {
        self.servers.try_recv().ok()
    }
}

/// Server side of one mock connection.
pub(crate) struct MockServer {
    frames: UnboundedReceiver<OutboundFrame>,
    events: UnboundedSender<TransportEvent>,
}

impl MockServer {
    pub(crate) fn send_text(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    pub(crate) fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    pub(crate) fn error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    pub(crate) fn close(&self, code: u16) {
        let _ = self.events.send(TransportEvent::Closed(CloseInfo::new(code, "")));
    }

    /// Next frame sent by the client, or `None` once it dropped the connection.
    pub(crate) async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.frames.next().await
    }

    /// Frames sent so far, without waiting.
    pub(crate) fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = self.frames.try_next() {
            frames.push(frame);
        }
        frames
    }

    /// Next text frame parsed as JSON.
    pub(crate) async fn next_json(&mut self) -> Option<Value> {
        while let Some(frame) = self.next_frame().await {
            if let OutboundFrame::Text(text) = frame {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    }
}
