//! Client configuration from environment variables.

/// REST API base used when `QA_PLAYGROUND_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// WebSocket base used when `QA_PLAYGROUND_WS_URL` is unset.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080";

/// Endpoints the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `QA_PLAYGROUND_API_URL`: REST base URL (default: `http://localhost:8080/api`)
    /// - `QA_PLAYGROUND_WS_URL`: WebSocket base URL (default: `ws://localhost:8080`).
    ///   An `http(s)://` value is converted to `ws(s)://`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base_url = lookup("QA_PLAYGROUND_API_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let ws_base_url = lookup("QA_PLAYGROUND_WS_URL")
            .filter(|value| !value.trim().is_empty())
            .map(|value| http_to_ws_scheme(&value))
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            ws_base_url: ws_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ws_base_url: DEFAULT_WS_URL.to_string(),
        }
    }
}

/// Convert an HTTP(S) URL to WS(S) scheme. `ws://` and `wss://` pass through.
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
