//! Client Transport
//!
//! A [`Transport`] turns one request envelope into one decoded response body.
//! [`HttpTransport`] does so with an HTTP POST:
//!
//! 1. Resolves caller-supplied headers (possibly asynchronously)
//! 2. Posts the serialized envelope with `accept`/`content-type: application/json`
//! 3. Fails with a `Transport` error on a non-success HTTP status
//! 4. Fails with an `Application` error when the body carries an `error` member
//! 5. Otherwise resolves with the decoded body
//!
//! Every failure is normalized into [`RpcError`]. An abort signalled while the
//! call is in flight drops the HTTP request and yields an `Aborted` error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tandem_common::transport::JSON_CONTENT_TYPE;
use tandem_common::{ErrorObject, RpcError, RpcRequest};

use crate::abort::AbortSignal;
use crate::config::ClientConfig;

/// Moves one envelope to the server and back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `envelope` and returns the decoded response body.
    async fn send(&self, envelope: &RpcRequest, signal: AbortSignal) -> Result<Value, RpcError>;
}

/// Supplies extra request headers per call, e.g. a freshly read auth header.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    async fn headers(&self) -> Result<HeaderMap, RpcError>;
}

#[async_trait]
impl<F, Fut> HeaderProvider for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = HeaderMap> + Send,
{
    async fn headers(&self) -> Result<HeaderMap, RpcError> {
        Ok((self)().await)
    }
}

/// HTTP POST transport.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    timeout: Option<Duration>,
    header_provider: Option<Arc<dyn HeaderProvider>>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RpcError::network(format!(
                "Invalid RPC URL '{}': must start with http:// or https://",
                url
            )));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            timeout: None,
            header_provider: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RpcError> {
        let transport = Self::new(config.url.clone())?;
        Ok(match config.timeout {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header_provider(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.header_provider = Some(Arc::new(provider));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, envelope: &RpcRequest) -> Result<Value, RpcError> {
        let extra = match &self.header_provider {
            Some(provider) => provider.headers().await?,
            None => HeaderMap::new(),
        };

        let body = serde_json::to_vec(envelope)
            .map_err(|e| RpcError::bad_request(format!("Failed to encode envelope: {}", e)))?;

        // Caller headers go last so they win over the fixed ones.
        let mut request = self
            .http
            .post(&self.url)
            .header(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .headers(extra)
            .body(body);

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(normalize_http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::transport(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        let data: Value = response.json().await.map_err(normalize_http_error)?;
        if let Some(error) = data.get("error").filter(|error| !error.is_null()) {
            let error: ErrorObject = serde_json::from_value(error.clone())
                .map_err(|e| RpcError::protocol(format!("Malformed error object: {}", e)))?;
            return Err(error.into());
        }

        Ok(data)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &RpcRequest, signal: AbortSignal) -> Result<Value, RpcError> {
        tracing::debug!(url = %self.url, method = %envelope.method, "Sending RPC envelope");
        signal.guard(self.post(envelope)).await
    }
}

fn normalize_http_error(err: reqwest::Error) -> RpcError {
    if let Some(status) = err.status() {
        return RpcError::transport(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status"),
        );
    }
    if err.is_timeout() {
        return RpcError::transport(408, "Request Timeout");
    }
    if err.is_decode() {
        return RpcError::protocol(format!("Failed to decode response body: {}", err));
    }
    RpcError::network(err.to_string())
}
