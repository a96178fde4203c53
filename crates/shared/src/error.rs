//! Shared error types: the normalized `ErrorInfo`, transport-level `ApiError`,
//! and RFC7807 Problem Details parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code used when a failure carries no structured error body.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Code used when a failure carried an RFC7807 body instead of an `ErrorInfo`.
pub const HTTP_ERROR: &str = "HTTP_ERROR";

/// Normalized error surfaced by request executors.
///
/// Backends are expected to answer failed requests with this exact shape
/// (`{ "code", "message", "statusCode" }`). Anything else is normalized into
/// it by [`ErrorInfo::from`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "camelCase")]
#[error("{code} ({status_code}): {message}")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Synthesized error for failures without a usable body.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(UNKNOWN_ERROR, message, 500)
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Client errors (4xx) are permanent, except request timeout (408) and
    /// rate limiting (429).
    pub fn is_transient(&self) -> bool {
        !(400..500).contains(&self.status_code) || matches!(self.status_code, 408 | 429)
    }
}

/// RFC7807 Problem Details (application/problem+json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// A URI reference that identifies the specific occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Attempt to parse an RFC7807 (or RFC7807-ish) JSON body into a user-facing message.
/// Prefers `detail`, falls back to `title`.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ProblemDetails>(body).ok()?;
    if let Some(detail) = parsed.detail {
        if !detail.trim().is_empty() {
            return Some(detail);
        }
    }
    if !parsed.title.trim().is_empty() {
        return Some(parsed.title);
    }
    None
}

/// Transport-level failure raised by request operations and the REST client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// The failure already carries a structured error body.
    #[error(transparent)]
    Api(ErrorInfo),
}

impl From<ErrorInfo> for ApiError {
    fn from(info: ErrorInfo) -> Self {
        ApiError::Api(info)
    }
}

impl From<&ApiError> for ErrorInfo {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Api(info) => info.clone(),
            ApiError::Network(msg) | ApiError::Deserialize(msg) => ErrorInfo::unknown(msg.clone()),
            ApiError::Http { status, body } => {
                if let Ok(info) = serde_json::from_str::<ErrorInfo>(body) {
                    return info;
                }
                if let Some(detail) = try_problem_detail(body) {
                    return ErrorInfo::new(HTTP_ERROR, detail, *status);
                }
                let message = if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.clone()
                };
                ErrorInfo::new(UNKNOWN_ERROR, message, *status)
            }
        }
    }
}

impl From<ApiError> for ErrorInfo {
    fn from(err: ApiError) -> Self {
        ErrorInfo::from(&err)
    }
}
