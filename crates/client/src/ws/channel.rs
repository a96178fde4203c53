//! One WebSocket connection with heartbeat, auto-reconnect and auth-driven
//! auto-connect.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use qa_playground_shared::{is_pong, Heartbeat};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use url::Url;

use super::connection::{
    CloseInfo, Connector, OutboundFrame, ReadyState, ReconnectConfig, SocketConnection,
    SocketMessage, TransportEvent, TungsteniteConnector,
};
use super::MIN_TICK;
use crate::auth_session::AuthSignal;
use crate::config::ClientConfig;
use crate::lifecycle::Liveness;

/// Delay between the close and the reopen of a manual [`SocketChannel::reconnect`].
pub const MANUAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct SocketOptions {
    pub reconnect: ReconnectConfig,
    /// Reconnect after an unexpected close.
    pub auto_reconnect: bool,
    /// Send `{"type":"ping"}` every `heartbeat_interval` while open.
    pub heartbeat: bool,
    pub heartbeat_interval: Duration,
    /// Connect whenever the auth signal carries a session.
    pub auto_connect: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            auto_reconnect: true,
            heartbeat: true,
            heartbeat_interval: Duration::from_secs(30),
            auto_connect: true,
        }
    }
}

impl SocketOptions {
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.reconnect.max_attempts = max_attempts;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect.interval = interval;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn heartbeat(mut self, interval: Option<Duration>) -> Self {
        match interval {
            Some(interval) => {
                self.heartbeat = true;
                self.heartbeat_interval = interval;
            }
            None => self.heartbeat = false,
        }
        self
    }

    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }
}

/// Lifecycle callbacks of a channel. All are optional.
#[derive(Clone, Default)]
pub struct SocketCallbacks {
    on_open: Option<Arc<dyn Fn() + Send + Sync>>,
    on_message: Option<Arc<dyn Fn(&SocketMessage) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_close: Option<Arc<dyn Fn(&CloseInfo) + Send + Sync>>,
    on_reconnect: Option<Arc<dyn Fn(u32) + Send + Sync>>,
}

impl SocketCallbacks {
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Every inbound frame except heartbeat replies.
    pub fn on_message(mut self, f: impl Fn(&SocketMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Unexpected closes only; [`SocketChannel::disconnect`] does not report.
    pub fn on_close(mut self, f: impl Fn(&CloseInfo) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Called with the new attempt number when a reconnect is scheduled.
    pub fn on_reconnect(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }
}

/// Everything a channel needs besides its path.
#[derive(Clone)]
pub struct SocketEndpoint {
    pub base_url: String,
    pub auth: AuthSignal,
    pub connector: Arc<dyn Connector>,
    pub options: SocketOptions,
}

impl SocketEndpoint {
    pub fn new(base_url: impl Into<String>, auth: AuthSignal, connector: Arc<dyn Connector>) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            connector,
            options: SocketOptions::default(),
        }
    }

    /// Endpoint on the configured WebSocket base using the tungstenite transport.
    pub fn from_config(config: &ClientConfig, auth: AuthSignal) -> Self {
        Self::new(config.ws_base_url.clone(), auth, Arc::new(TungsteniteConnector))
    }

    pub fn options(mut self, options: SocketOptions) -> Self {
        self.options = options;
        self
    }
}

/// `base/path[?token=...]`.
pub fn build_socket_url(base: &str, path: &str, token: Option<&str>) -> Result<String, url::ParseError> {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    let joined = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    };

    let mut url = Url::parse(&joined)?;
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url.into())
}

#[derive(Default)]
struct Runtime {
    /// Bumped whenever a connection is started or abandoned; events of older
    /// connections are ignored.
    generation: u64,
    reconnect_attempt: u32,
    outgoing: Option<futures_channel::mpsc::UnboundedSender<OutboundFrame>>,
    connection: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl Runtime {
    fn stop_timers(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }
}

struct ChannelInner {
    /// Channel path for logs; the full URL may carry a token.
    label: String,
    path: String,
    endpoint: SocketEndpoint,
    callbacks: SocketCallbacks,
    ready_state: watch::Sender<ReadyState>,
    last_message: Mutex<Option<String>>,
    last_json_message: Mutex<Option<Value>>,
    runtime: Mutex<Runtime>,
    auto_connect: Mutex<Option<JoinHandle<()>>>,
    liveness: Liveness,
}

/// A WebSocket channel on `base_url/path`.
///
/// Clones share the same connection. The connection is closed and every
/// timer cancelled on [`SocketChannel::teardown`] or when the last clone is
/// dropped.
#[derive(Clone)]
pub struct SocketChannel {
    inner: Arc<ChannelInner>,
}

/// Open a channel on `path` below the endpoint's base URL.
///
/// With `auto_connect` (the default) the channel connects as soon as the
/// auth signal carries a session; this must then be called from within a
/// tokio runtime.
pub fn use_websocket(endpoint: SocketEndpoint, path: impl Into<String>, callbacks: SocketCallbacks) -> SocketChannel {
    let path = path.into().trim_matches('/').to_string();
    let (ready_state, _) = watch::channel(ReadyState::Closed);
    let auto_connect = endpoint.options.auto_connect;
    let auth = endpoint.auth.clone();

    let inner = Arc::new(ChannelInner {
        label: format!("/{path}"),
        path,
        endpoint,
        callbacks,
        ready_state,
        last_message: Mutex::new(None),
        last_json_message: Mutex::new(None),
        runtime: Mutex::new(Runtime::default()),
        auto_connect: Mutex::new(None),
        liveness: Liveness::new(),
    });

    if auto_connect {
        let task = tokio::spawn(follow_auth(Arc::downgrade(&inner), auth));
        *inner.auto_connect.lock() = Some(task);
    }

    SocketChannel { inner }
}

impl SocketChannel {
    /// Open the connection. No-op while connecting or open.
    pub fn connect(&self) {
        self.inner.open();
    }

    /// Close the connection and cancel timers. Suppresses auto-reconnect
    /// until the next successful open.
    pub fn disconnect(&self) {
        self.inner.close();
    }

    /// Close, then reopen after [`MANUAL_RECONNECT_DELAY`] with a fresh
    /// reconnect budget.
    pub fn reconnect(&self) {
        let inner = &self.inner;
        if !inner.liveness.is_alive() {
            return;
        }
        inner.close();
        inner.runtime.lock().reconnect_attempt = 0;
        tracing::info!("WebSocket {} manual reconnect", inner.label);
        inner.schedule_connect(MANUAL_RECONNECT_DELAY);
    }

    /// Send a raw text frame. Dropped with a warning unless open.
    pub fn send_message(&self, text: impl Into<String>) -> bool {
        self.inner.send(text.into())
    }

    /// Serialize `value` and send it as a text frame. Dropped with a warning
    /// unless open.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(text) => self.inner.send(text),
            Err(e) => {
                tracing::warn!("WebSocket {}: failed to serialize message: {}", self.inner.label, e);
                false
            }
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.inner.ready_state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state().is_open()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ReadyState> {
        self.inner.ready_state.subscribe()
    }

    /// Raw payload of the latest inbound frame.
    pub fn last_message(&self) -> Option<String> {
        self.inner.last_message.lock().clone()
    }

    /// Latest inbound frame that parsed as JSON, heartbeat replies included.
    pub fn last_json_message(&self) -> Option<Value> {
        self.inner.last_json_message.lock().clone()
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.runtime.lock().reconnect_attempt
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// The owner is gone: stop following auth, close and never reopen.
    pub fn teardown(&self) {
        let inner = &self.inner;
        inner.liveness.invalidate();
        if let Some(task) = inner.auto_connect.lock().take() {
            task.abort();
        }
        inner.close();
    }
}

impl ChannelInner {
    fn is_current(&self, generation: u64) -> bool {
        self.runtime.lock().generation == generation
    }

    fn open(self: &Arc<Self>) {
        if !self.liveness.is_alive() {
            return;
        }
        let state = *self.ready_state.borrow();
        if matches!(state, ReadyState::Open | ReadyState::Connecting) {
            tracing::debug!("WebSocket {} already {:?}", self.label, state);
            return;
        }

        let token = self.endpoint.auth.access_token();
        let url = match build_socket_url(&self.endpoint.base_url, &self.path, token.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("WebSocket {}: invalid URL: {}", self.label, e);
                self.emit_error(&e.to_string());
                return;
            }
        };

        let generation = {
            let mut rt = self.runtime.lock();
            rt.generation += 1;
            rt.stop_timers();
            if let Some(stale) = rt.connection.take() {
                stale.abort();
            }
            rt.generation
        };
        self.ready_state.send_replace(ReadyState::Connecting);
        tracing::debug!("WebSocket {} connecting", self.label);

        let task = tokio::spawn(run_connection(
            Arc::downgrade(self),
            Arc::clone(&self.endpoint.connector),
            url,
            generation,
        ));
        let mut rt = self.runtime.lock();
        if rt.generation == generation {
            rt.connection = Some(task);
        } else {
            task.abort();
        }
    }

    fn close(&self) {
        let outgoing = {
            let mut rt = self.runtime.lock();
            rt.generation += 1;
            rt.reconnect_attempt = self.endpoint.options.reconnect.max_attempts;
            rt.stop_timers();
            if let Some(connection) = rt.connection.take() {
                connection.abort();
            }
            rt.outgoing.take()
        };

        if let Some(outgoing) = outgoing {
            self.ready_state.send_replace(ReadyState::Closing);
            let _ = outgoing.unbounded_send(OutboundFrame::Close);
        }
        let previous = self.ready_state.send_replace(ReadyState::Closed);
        if previous != ReadyState::Closed {
            tracing::info!("WebSocket {} disconnected", self.label);
        }
    }

    fn send(&self, text: String) -> bool {
        if !self.ready_state.borrow().is_open() {
            tracing::warn!("WebSocket {} is not open, message dropped", self.label);
            return false;
        }
        let rt = self.runtime.lock();
        match rt.outgoing.as_ref() {
            Some(outgoing) => outgoing.unbounded_send(OutboundFrame::Text(text)).is_ok(),
            None => {
                tracing::warn!("WebSocket {} is not open, message dropped", self.label);
                false
            }
        }
    }

    /// Adopt a freshly opened transport. Returns `false` and closes it when
    /// the attempt was superseded by `disconnect`, `teardown` or a newer open.
    fn handle_open(self: &Arc<Self>, generation: u64, outgoing: futures_channel::mpsc::UnboundedSender<OutboundFrame>) -> bool {
        {
            let mut rt = self.runtime.lock();
            if rt.generation != generation || !self.liveness.is_alive() {
                tracing::debug!("WebSocket {} opened after being superseded", self.label);
                let _ = outgoing.unbounded_send(OutboundFrame::Close);
                return false;
            }
            rt.reconnect_attempt = 0;
            rt.outgoing = Some(outgoing);
            let options = &self.endpoint.options;
            if options.heartbeat {
                rt.heartbeat = Some(tokio::spawn(heartbeat(
                    Arc::downgrade(self),
                    generation,
                    options.heartbeat_interval,
                )));
            }
            // Under the lock, so a concurrent close publishes after it.
            self.ready_state.send_replace(ReadyState::Open);
        }
        tracing::info!("WebSocket {} open", self.label);
        if let Some(on_open) = self.callbacks.on_open.as_ref() {
            on_open();
        }
        true
    }

    fn handle_message(&self, text: String) {
        if !self.liveness.is_alive() {
            return;
        }
        *self.last_message.lock() = Some(text.clone());

        let message = match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                *self.last_json_message.lock() = Some(value.clone());
                if is_pong(&value) {
                    tracing::trace!("WebSocket {} heartbeat reply", self.label);
                    return;
                }
                SocketMessage::Json(value)
            }
            Err(_) => SocketMessage::Text(text),
        };
        if let Some(on_message) = self.callbacks.on_message.as_ref() {
            on_message(&message);
        }
    }

    fn emit_error(&self, error: &str) {
        if let Some(on_error) = self.callbacks.on_error.as_ref() {
            on_error(error);
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64, info: CloseInfo) {
        let options = &self.endpoint.options;
        let attempt = {
            let mut rt = self.runtime.lock();
            if rt.generation != generation {
                return;
            }
            rt.outgoing = None;
            // Called from the connection task itself.
            rt.connection = None;
            rt.stop_timers();
            let may_reconnect = self.liveness.is_alive()
                && options.auto_reconnect
                && rt.reconnect_attempt < options.reconnect.max_attempts;
            if may_reconnect {
                rt.reconnect_attempt += 1;
                Some(rt.reconnect_attempt)
            } else {
                None
            }
        };

        self.ready_state.send_replace(ReadyState::Closed);
        tracing::info!(
            "WebSocket {} closed (code {}{}{})",
            self.label,
            info.code,
            if info.reason.is_empty() { "" } else { ": " },
            info.reason
        );
        if let Some(on_close) = self.callbacks.on_close.as_ref() {
            on_close(&info);
        }

        if let Some(attempt) = attempt {
            let delay = options.reconnect.delay_for_attempt(attempt);
            tracing::info!(
                "WebSocket {} reconnecting in {:?} (attempt {}/{})",
                self.label,
                delay,
                attempt,
                options.reconnect.max_attempts
            );
            if let Some(on_reconnect) = self.callbacks.on_reconnect.as_ref() {
                on_reconnect(attempt);
            }
            self.schedule_connect(delay);
        }
    }

    /// Replace any pending reconnect timer with one firing after `delay`.
    fn schedule_connect(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.runtime.lock().reconnect_timer = None;
                inner.open();
            }
        });
        if let Some(previous) = self.runtime.lock().reconnect_timer.replace(timer) {
            previous.abort();
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(task) = self.auto_connect.get_mut().take() {
            task.abort();
        }
        let rt = self.runtime.get_mut();
        rt.stop_timers();
        if let Some(connection) = rt.connection.take() {
            connection.abort();
        }
        if let Some(outgoing) = rt.outgoing.take() {
            let _ = outgoing.unbounded_send(OutboundFrame::Close);
        }
    }
}

async fn run_connection(weak: Weak<ChannelInner>, connector: Arc<dyn Connector>, url: String, generation: u64) {
    let result = connector.connect(&url).await;

    let SocketConnection { outgoing, mut incoming } = {
        let Some(inner) = weak.upgrade() else { return };
        if !inner.is_current(generation) {
            if let Ok(connection) = result {
                let _ = connection.outgoing.unbounded_send(OutboundFrame::Close);
            }
            return;
        }
        match result {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("WebSocket {} failed to open: {:#}", inner.label, e);
                inner.emit_error(&e.to_string());
                inner.handle_close(generation, CloseInfo::abnormal(e.to_string()));
                return;
            }
        }
    };

    let opened = match weak.upgrade() {
        Some(inner) => inner.handle_open(generation, outgoing),
        None => false,
    };
    if !opened {
        return;
    }

    while let Some(event) = incoming.recv().await {
        let Some(inner) = weak.upgrade() else { return };
        if !inner.is_current(generation) {
            return;
        }
        match event {
            TransportEvent::Message(text) => inner.handle_message(text),
            TransportEvent::Error(e) => {
                tracing::warn!("WebSocket {} error: {}", inner.label, e);
                inner.emit_error(&e);
            }
            TransportEvent::Closed(info) => {
                inner.handle_close(generation, info);
                return;
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.handle_close(generation, CloseInfo::abnormal("transport ended"));
    }
}

async fn heartbeat(weak: Weak<ChannelInner>, generation: u64, period: Duration) {
    let period = period.max(MIN_TICK);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else { return };
        if !inner.is_current(generation) {
            return;
        }
        match serde_json::to_string(&Heartbeat::Ping) {
            Ok(ping) => {
                inner.send(ping);
            }
            Err(e) => tracing::error!("Failed to encode heartbeat: {}", e),
        }
    }
}

async fn follow_auth(weak: Weak<ChannelInner>, mut auth: AuthSignal) {
    let mut current = auth.observe();
    if current.is_some() {
        match weak.upgrade() {
            Some(inner) => inner.open(),
            None => return,
        }
    }

    while auth.changed().await {
        let next = auth.observe();
        if next == current {
            continue;
        }
        current = next;

        let Some(inner) = weak.upgrade() else { return };
        if *inner.ready_state.borrow() != ReadyState::Closed {
            inner.close();
        }
        if current.is_some() {
            tracing::debug!("WebSocket {} session changed, connecting", inner.label);
            inner.open();
        }
    }
}
