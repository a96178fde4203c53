//! QA playground client - request and subscription layer.
//!
//! Two families of stateful components sit between the playground views and
//! the backend:
//!
//! - [`request`]: executors wrapping one asynchronous operation with
//!   `{ data, loading, error }` state, retries and caching, plus paginated,
//!   infinite-scroll, polling and REST-verb forms.
//! - [`ws`]: WebSocket channels with heartbeat and auto-reconnect, plus the
//!   chat, notification, collaboration and live-data channels built on them.
//!
//! Both read the session through an injected [`AuthSignal`].

pub mod api_client;
pub mod auth_session;
pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod request;
pub mod storage;
pub mod stores;
pub mod ws;

pub use api_client::{ApiClient, HttpClient};
pub use auth_session::{AuthContext, AuthSession, AuthSignal};
pub use config::ClientConfig;
pub use lifecycle::Liveness;
pub use storage::Storage;
