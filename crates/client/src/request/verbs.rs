//! Executors bound to a fixed REST endpoint and verb.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::executor::{RequestExecutor, RequestOptions};
use crate::api_client::{decode, HttpClient, Method, RequestConfig};

/// Arguments of a verb executor: optional JSON body and request extras.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub body: Option<Value>,
    pub config: Option<RequestConfig>,
}

impl Payload {
    pub fn body(body: Value) -> Self {
        Self {
            body: Some(body),
            config: None,
        }
    }

    /// Serialize `body` into a payload.
    pub fn json<B: Serialize>(body: &B) -> Result<Self, serde_json::Error> {
        Ok(Self::body(serde_json::to_value(body)?))
    }

    pub fn config(config: RequestConfig) -> Self {
        Self {
            body: None,
            config: Some(config),
        }
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(config);
        self
    }
}

pub type EndpointExecutor<T> = RequestExecutor<Payload, T>;

/// Bind an executor to `method endpoint`, decoding responses into `T`.
pub fn use_endpoint<T>(
    client: Arc<dyn HttpClient>,
    method: Method,
    endpoint: impl Into<String>,
    options: RequestOptions<T>,
) -> EndpointExecutor<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    let endpoint: Arc<str> = Arc::from(endpoint.into());
    RequestExecutor::new(
        move |payload: Payload| {
            let client = Arc::clone(&client);
            let endpoint = Arc::clone(&endpoint);
            async move {
                let resp = client
                    .request(method, &endpoint, payload.body.as_ref(), payload.config.as_ref())
                    .await?;
                decode(resp)
            }
        },
        options,
    )
}

pub fn use_get<T>(
    client: Arc<dyn HttpClient>,
    endpoint: impl Into<String>,
    options: RequestOptions<T>,
) -> EndpointExecutor<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    use_endpoint(client, Method::Get, endpoint, options)
}

pub fn use_post<T>(
    client: Arc<dyn HttpClient>,
    endpoint: impl Into<String>,
    options: RequestOptions<T>,
) -> EndpointExecutor<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    use_endpoint(client, Method::Post, endpoint, options)
}

pub fn use_put<T>(
    client: Arc<dyn HttpClient>,
    endpoint: impl Into<String>,
    options: RequestOptions<T>,
) -> EndpointExecutor<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    use_endpoint(client, Method::Put, endpoint, options)
}

pub fn use_delete<T>(
    client: Arc<dyn HttpClient>,
    endpoint: impl Into<String>,
    options: RequestOptions<T>,
) -> EndpointExecutor<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    use_endpoint(client, Method::Delete, endpoint, options)
}
