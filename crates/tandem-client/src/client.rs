use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_common::{RpcError, RpcRequest, RpcResponse};

use crate::abort::{AbortController, AbortSignal};
use crate::config::ClientConfig;
use crate::pending::{CallId, PendingRegistry, RegistryGuard};
use crate::resource::Resource;
use crate::transport::{HttpTransport, Transport};

/// Tandem RPC client.
///
/// Binds remote method names to calls over a [`Transport`]. Cloning is cheap
/// and clones share the transport, the correlation-id counter and the
/// pending-call registry, so [`abort_all`](Self::abort_all) on any clone
/// reaches every call and every resource built from it.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    next_id: AtomicU64,
    pending: PendingRegistry,
}

impl RpcClient {
    /// Creates a client posting to `config.url` over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self, RpcError> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                config,
                next_id: AtomicU64::new(1),
                pending: PendingRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn pending(&self) -> &PendingRegistry {
        &self.inner.pending
    }

    /// Calls `method` with positional `params` and returns the decoded result.
    ///
    /// # Errors
    ///
    /// - `MethodNotFound` if the method is not part of the configured contract
    ///   (no network call is made)
    /// - any normalized transport, protocol or application error
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.call_with_signal(method, params, AbortSignal::never()).await
    }

    /// Like [`call`](Self::call) but deserializes the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::protocol(format!("Unexpected result shape: {}", e)))
    }

    /// Calls `method`, giving up as soon as `signal` fires.
    pub async fn call_with_signal(
        &self,
        method: &str,
        params: Vec<Value>,
        signal: AbortSignal,
    ) -> Result<Value, RpcError> {
        if !self.inner.config.allows(method) {
            return Err(RpcError::method_not_found());
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = RpcRequest::new(id, method, params);

        tracing::debug!(id, method, "Calling RPC method");
        let body = self.inner.transport.send(&envelope, signal).await?;
        let response = RpcResponse::from_value(body)?;

        if response.id != Value::from(id) {
            return Err(RpcError::protocol(format!(
                "Response id {} does not match request id {}",
                response.id, id
            )));
        }

        response.into_result()
    }

    /// Starts a call and returns a handle to it.
    ///
    /// While cancellation is enabled the call is tracked in the pending-call
    /// registry from this moment until it settles, so it can be aborted with
    /// [`abort`](Self::abort) or [`abort_all`](Self::abort_all).
    pub fn start(&self, method: &str, params: Vec<Value>) -> PendingCall {
        let id = self.inner.pending.next_id();
        let controller = AbortController::new();
        let signal = controller.signal();

        let guard = if self.inner.config.abortable {
            self.inner.pending.insert(id, controller.clone());
            Some(RegistryGuard::new(self.inner.pending.clone(), id))
        } else {
            None
        };

        let client = self.clone();
        let method = method.to_string();
        let future = async move {
            let _guard = guard;
            client.call_with_signal(&method, params, signal).await
        }
        .boxed();

        PendingCall {
            id,
            controller,
            future,
        }
    }

    /// Aborts one tracked call. Returns whether it was still in flight.
    pub fn abort(&self, id: CallId) -> bool {
        let aborted = self.inner.pending.abort(id);
        if aborted {
            tracing::debug!(call = id.as_u64(), "Aborted pending call");
        }
        aborted
    }

    /// Aborts every tracked call, e.g. on teardown.
    pub fn abort_all(&self) {
        let count = self.inner.pending.abort_all();
        if count > 0 {
            tracing::debug!(count, "Aborted all pending calls");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Creates an eager resource: it fetches once right away.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resource<T>(&self, method: impl Into<String>, args: Vec<Value>) -> Resource<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Resource::new(self.clone(), method.into(), args, false)
    }

    /// Creates a lazy resource: it only fetches on `fetch` or `update_args`.
    pub fn lazy_resource<T>(&self, method: impl Into<String>, args: Vec<Value>) -> Resource<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Resource::new(self.clone(), method.into(), args, true)
    }
}

/// An in-flight call started with [`RpcClient::start`].
///
/// Resolves to the call's result. Dropping it cancels the call.
pub struct PendingCall {
    id: CallId,
    controller: AbortController,
    future: BoxFuture<'static, Result<Value, RpcError>>,
}

impl PendingCall {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Aborts this call whether or not it is tracked in the registry.
    pub fn abort(&self) {
        self.controller.abort();
    }
}

impl Future for PendingCall {
    type Output = Result<Value, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::time::Duration;
    use tandem_common::ErrorKind;

    #[tokio::test]
    async fn test_call_returns_result() {
        let transport = ScriptedTransport::echo();
        let client = RpcClient::with_transport(transport.clone(), ClientConfig::default());

        let result = client.call("echo", vec![json!({"a": 1})]).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_correlation_ids_increase() {
        let transport = ScriptedTransport::echo();
        let client = RpcClient::with_transport(transport.clone(), ClientConfig::default());

        client.call("echo", vec![json!(1)]).await.unwrap();
        client.call("echo", vec![json!(2)]).await.unwrap();

        let ids: Vec<_> = transport.calls().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(2))]);
    }

    #[tokio::test]
    async fn test_unknown_method_fails_before_network() {
        let transport = ScriptedTransport::echo();
        let config = ClientConfig::default().with_methods(["hello"]);
        let client = RpcClient::with_transport(transport.clone(), config);

        let err = client.call("missing", vec![]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MethodNotFound);
        assert_eq!(err.code, 404);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_id_is_protocol_error() {
        let transport = ScriptedTransport::new(|_req| Ok(json!({"id": 999, "result": 1})));
        let client = RpcClient::with_transport(transport, ClientConfig::default());

        let err = client.call("x", vec![]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_call_as_deserializes() {
        #[derive(serde::Deserialize)]
        struct Greeting {
            message: String,
        }

        let client = RpcClient::with_transport(ScriptedTransport::echo(), ClientConfig::default());
        let greeting: Greeting = client
            .call_as("echo", vec![json!({"message": "hi"})])
            .await
            .unwrap();
        assert_eq!(greeting.message, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_tracks_until_settled() {
        let transport = ScriptedTransport::echo().with_delay(Duration::from_millis(100));
        let client = RpcClient::with_transport(transport, ClientConfig::default());

        let call = client.start("echo", vec![json!(5)]);
        assert_eq!(client.pending_count(), 1);

        assert_eq!(call.await.unwrap(), json!(5));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_specific_call() {
        let transport = ScriptedTransport::echo().with_delay(Duration::from_secs(10));
        let client = RpcClient::with_transport(transport, ClientConfig::default());

        let call = client.start("echo", vec![json!(5)]);
        let id = call.id();
        let task = tokio::spawn(call);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(client.abort(id));
        assert!(!client.abort(id));

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_abort());
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all() {
        let transport = ScriptedTransport::echo().with_delay(Duration::from_secs(10));
        let client = RpcClient::with_transport(transport, ClientConfig::default());

        let a = tokio::spawn(client.start("echo", vec![json!(1)]));
        let b = tokio::spawn(client.start("echo", vec![json!(2)]));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(client.pending_count(), 2);

        client.abort_all();
        assert_eq!(client.pending_count(), 0);
        assert!(a.await.unwrap().unwrap_err().is_abort());
        assert!(b.await.unwrap().unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn test_untracked_when_not_abortable() {
        let transport = ScriptedTransport::echo();
        let client = RpcClient::with_transport(
            transport,
            ClientConfig::default().with_abortable(false),
        );

        let call = client.start("echo", vec![json!(1)]);
        assert_eq!(client.pending_count(), 0);
        assert!(!client.abort(call.id()));
        assert_eq!(call.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_dropped_call_leaves_no_entry() {
        let client = RpcClient::with_transport(ScriptedTransport::echo(), ClientConfig::default());
        let call = client.start("echo", vec![]);
        assert_eq!(client.pending_count(), 1);
        drop(call);
        assert_eq!(client.pending_count(), 0);
    }
}
