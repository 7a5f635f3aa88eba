//! In-process transport for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tandem_common::{RpcError, RpcRequest};

use crate::abort::AbortSignal;
use crate::transport::Transport;

type Responder = dyn Fn(&RpcRequest) -> Result<Value, RpcError> + Send + Sync;

/// Answers every envelope through a closure after an optional delay and
/// records what was sent.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    responder: Arc<Responder>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RpcRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&RpcRequest) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the first parameter as the result.
    pub(crate) fn echo() -> Self {
        Self::new(|req| {
            let result = req.params.first().cloned().unwrap_or(Value::Null);
            Ok(json!({"id": req.id, "result": result}))
        })
    }

    /// Mimics the `hello` root method.
    pub(crate) fn hello() -> Self {
        Self::new(|req| {
            let message = req
                .params
                .first()
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!({"id": req.id, "result": {"message": format!("Hello, {}!", message)}}))
        })
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<RpcRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, envelope: &RpcRequest, signal: AbortSignal) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(envelope.clone());
        signal
            .guard(async {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                (self.responder)(envelope)
            })
            .await
    }
}
