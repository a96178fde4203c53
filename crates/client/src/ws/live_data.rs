//! Live data stream channel with batched flushing.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use qa_playground_shared::LiveDataFrame;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::channel::{use_websocket, SocketCallbacks, SocketChannel, SocketEndpoint};
use super::{decode_message, MIN_TICK};
use crate::stores::LiveDataState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveDataOptions {
    /// How often buffered points become visible.
    pub flush_interval: Duration,
    pub max_points: usize,
}

impl Default for LiveDataOptions {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            max_points: 100,
        }
    }
}

/// A data stream on `/stream/{channel}`.
///
/// Incoming `data` frames are buffered and published in batches every
/// `flush_interval`; a `snapshot` frame replaces everything immediately.
pub struct LiveDataChannel {
    socket: SocketChannel,
    state: Arc<watch::Sender<LiveDataState>>,
    buffer: Arc<Mutex<Vec<Value>>>,
    flush: Mutex<Option<JoinHandle<()>>>,
}

/// Must be called from within a tokio runtime.
pub fn use_live_data(endpoint: SocketEndpoint, channel: &str, options: LiveDataOptions) -> LiveDataChannel {
    let (state, _) = watch::channel(LiveDataState::new(options.max_points));
    let state = Arc::new(state);
    let buffer = Arc::new(Mutex::new(Vec::new()));

    let callbacks = SocketCallbacks::default().on_message({
        let state = Arc::clone(&state);
        let buffer = Arc::clone(&buffer);
        move |message| match decode_message::<LiveDataFrame>("live data", message) {
            Some(LiveDataFrame::Data { data }) => buffer.lock().push(data),
            Some(LiveDataFrame::Snapshot { data }) => {
                buffer.lock().clear();
                state.send_modify(|s| s.replace(data));
            }
            None => {}
        }
    });
    let socket = use_websocket(endpoint, format!("stream/{channel}"), callbacks);

    let flush = tokio::spawn(flush_periodically(
        Arc::clone(&state),
        Arc::clone(&buffer),
        options.flush_interval,
    ));

    LiveDataChannel {
        socket,
        state,
        buffer,
        flush: Mutex::new(Some(flush)),
    }
}

async fn flush_periodically(
    state: Arc<watch::Sender<LiveDataState>>,
    buffer: Arc<Mutex<Vec<Value>>>,
    period: Duration,
) {
    let period = period.max(MIN_TICK);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let batch = std::mem::take(&mut *buffer.lock());
        if !batch.is_empty() {
            state.send_modify(|s| s.extend(batch));
        }
    }
}

impl LiveDataChannel {
    pub fn points(&self) -> Vec<Value> {
        self.state.borrow().points.clone()
    }

    pub fn latest(&self) -> Option<Value> {
        self.state.borrow().latest().cloned()
    }

    /// Points received but not flushed yet.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveDataState> {
        self.state.subscribe()
    }

    pub fn socket(&self) -> &SocketChannel {
        &self.socket
    }

    pub fn teardown(&self) {
        if let Some(flush) = self.flush.lock().take() {
            flush.abort();
        }
        self.socket.teardown();
    }
}

impl Drop for LiveDataChannel {
    fn drop(&mut self) {
        if let Some(flush) = self.flush.get_mut().take() {
            flush.abort();
        }
    }
}
