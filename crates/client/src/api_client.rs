//! HTTP API client with bearer-token authentication.

use async_trait::async_trait;
use qa_playground_shared::ApiError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth_session::AuthSignal;

/// HTTP verbs supported by the REST backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// Per-request extras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful response: decoded JSON body plus status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
}

/// The REST surface request executors are bound to.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        config: Option<&RequestConfig>,
    ) -> Result<ApiResponse, ApiError>;
}

/// HTTP client for the playground REST backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Option<AuthSignal>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            auth: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Attach the bearer token of the current session to every request.
    pub fn with_auth(mut self, auth: AuthSignal) -> Self {
        self.auth = Some(auth);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// GET and decode the JSON response
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let resp = self.request(Method::Get, path, None, None).await?;
        decode(resp)
    }

    /// POST a JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let body = encode(body)?;
        let resp = self.request(Method::Post, path, Some(&body), None).await?;
        decode(resp)
    }

    /// PUT a JSON body
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let body = encode(body)?;
        let resp = self.request(Method::Put, path, Some(&body), None).await?;
        decode(resp)
    }

    /// PATCH a JSON body
    pub async fn patch_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let body = encode(body)?;
        let resp = self.request(Method::Patch, path, Some(&body), None).await?;
        decode(resp)
    }

    /// DELETE a resource
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::Delete, path, None, None).await?;
        Ok(())
    }
}

#[async_trait]
impl HttpClient for ApiClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        config: Option<&RequestConfig>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url(path);
        let mut rb = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        if let Some(token) = self.auth.as_ref().and_then(AuthSignal::access_token) {
            rb = rb.bearer_auth(token);
        }
        if let Some(config) = config {
            if !config.query.is_empty() {
                rb = rb.query(&config.query);
            }
            for (name, value) in &config.headers {
                rb = rb.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }

        tracing::debug!("{} {}", method.as_str(), url);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        let data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))?
        };
        Ok(ApiResponse { data, status })
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a response body into `T`.
pub fn decode<T: DeserializeOwned>(resp: ApiResponse) -> Result<T, ApiError> {
    serde_json::from_value(resp.data).map_err(|e| ApiError::Deserialize(e.to_string()))
}

fn encode<T: Serialize>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Deserialize(e.to_string()))
}
