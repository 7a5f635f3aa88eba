//! RPC Dispatcher
//!
//! Turns one raw request body into exactly one response envelope:
//!
//! 1. Decodes the envelope (`BadRequest` when malformed)
//! 2. Looks the method up in the [`MethodRegistry`] (`MethodNotFound` when absent)
//! 3. Runs the handler inside whatever request context is active
//! 4. Classifies failures and echoes the correlation `id`
//!
//! # Error Classification
//!
//! Handlers return `anyhow::Result<Value>`. An error whose chain contains an
//! [`RpcError`] is sent as that error. Anything else, a panic included, is
//! degraded to `500 Internal Server Error`; with `debug` enabled the
//! original message and chain go into `error.data`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tandem_common::{RpcError, RpcRequest, RpcResponse};
use tracing::Instrument;

/// Future returned by a registered handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Value>>;

type Handler = Arc<dyn Fn(Params) -> HandlerFuture + Send + Sync>;

/// Positional arguments of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new(params: Vec<Value>) -> Self {
        Self(params)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Deserializes the argument at `index`.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the argument is missing or has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, RpcError> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| RpcError::bad_request(format!("Missing argument {}", index)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::bad_request(format!("Invalid argument {}: {}", index, e)))
    }

    /// Like [`get`](Self::get), but a missing or `null` argument yields `T::default()`.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, index: usize) -> Result<T, RpcError> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(_) => self.get(index),
        }
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

/// Method name to handler mapping.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Handler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    pub fn register<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| handler(params).boxed());
        self.methods.insert(name.into(), handler);
        self
    }

    /// Adds every method of `other`; names in `other` win.
    pub fn merge(mut self, other: MethodRegistry) -> Self {
        self.methods.extend(other.methods);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn get(&self, name: &str) -> Option<Handler> {
        self.methods.get(name).cloned()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodRegistry").field("methods", &names).finish()
    }
}

/// Executes calls against a shared, read-only registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    debug: bool,
}

impl Dispatcher {
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            debug: false,
        }
    }

    /// Includes internal error details in responses.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.registry.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Decodes `body` and dispatches it.
    pub async fn handle(&self, body: &[u8]) -> RpcResponse {
        match RpcRequest::decode(body) {
            Ok(request) => self.dispatch(request).await,
            Err(decode) => {
                tracing::debug!(error = %decode.error, "Rejected malformed envelope");
                RpcResponse::from_error(decode.id.unwrap_or(Value::Null), &decode.error)
            }
        }
    }

    /// Runs one decoded request.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        let span = tracing::debug_span!("rpc", method = %request.method, id = %id);

        async move {
            let started = Instant::now();

            let outcome = match self.registry.get(&request.method) {
                Some(handler) => self.invoke(handler, Params::new(request.params)).await,
                None => Err(RpcError::method_not_found()),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(result) => {
                    tracing::debug!(elapsed_ms, "Call succeeded");
                    RpcResponse::success(id, result)
                }
                Err(error) => {
                    tracing::debug!(elapsed_ms, code = error.code, "Call failed");
                    RpcResponse::from_error(id, &error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn invoke(&self, handler: Handler, params: Params) -> Result<Value, RpcError> {
        let run = async move { handler(params).await };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(self.classify(err)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Method panicked");
                let error = RpcError::internal();
                Err(if self.debug {
                    error.with_data(json!({ "message": message }))
                } else {
                    error
                })
            }
        }
    }

    fn classify(&self, err: anyhow::Error) -> RpcError {
        if let Some(rpc) = err.chain().find_map(|cause| cause.downcast_ref::<RpcError>()) {
            return rpc.clone();
        }

        tracing::error!(error = %format!("{:#}", err), "Unclassified method failure");
        let error = RpcError::internal();
        if self.debug {
            let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
            error.with_data(json!({ "message": err.to_string(), "chain": chain }))
        } else {
            error
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
