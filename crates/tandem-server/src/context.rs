//! Request Context
//!
//! Per-request storage that every function running inside
//! [`RequestContext::run`] can reach without threading it through call
//! signatures. It carries:
//!
//! - the env bindings and the inbound request
//! - the negotiated language and the matched page route
//! - an accumulator of response headers that nested code (an auth routine
//!   rotating a cookie, say) can add to
//!
//! Each call to `run` gets its own store, so concurrent requests never see
//! each other's context. The store lives in a Tokio task-local: work
//! handed to `tokio::spawn` must be wrapped with [`RequestContext::scope`]
//! to stay inside the request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use hyper::header::HeaderMap;
use hyper::{Method, Uri};
use tandem_common::transport::merge_headers;
use tandem_common::RpcError;

use crate::routes::Route;

tokio::task_local! {
    static CURRENT: Arc<ContextStore>;
}

/// The inbound request, as seen by handlers.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }
}

/// Fields supplied when a request context is established.
#[derive(Debug, Clone, Default)]
pub struct ContextInit {
    pub env: HashMap<String, String>,
    pub request: RequestInfo,
    pub lang: String,
}

/// One request's context.
#[derive(Debug)]
pub struct ContextStore {
    env: HashMap<String, String>,
    request: RequestInfo,
    mutable: Mutex<MutableFields>,
}

#[derive(Debug, Default)]
struct MutableFields {
    lang: String,
    route: Option<Route>,
    response_headers: HeaderMap,
}

impl ContextStore {
    fn new(init: ContextInit) -> Self {
        Self {
            env: init.env,
            request: init.request,
            mutable: Mutex::new(MutableFields {
                lang: init.lang,
                ..MutableFields::default()
            }),
        }
    }

    fn fields(&self) -> MutexGuard<'_, MutableFields> {
        self.mutable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    pub fn lang(&self) -> String {
        self.fields().lang.clone()
    }

    pub fn set_lang(&self, lang: impl Into<String>) {
        self.fields().lang = lang.into();
    }

    pub fn route(&self) -> Option<Route> {
        self.fields().route.clone()
    }

    pub fn set_route(&self, route: Route) {
        self.fields().route = Some(route);
    }

    /// Unions `headers` into the accumulated response headers. For every
    /// name in `headers`, its values replace whatever was accumulated.
    pub fn merge_response_headers(&self, headers: HeaderMap) {
        merge_headers(&mut self.fields().response_headers, headers);
    }

    pub fn response_headers(&self) -> HeaderMap {
        self.fields().response_headers.clone()
    }
}

/// Entry point to the current request's context.
pub struct RequestContext;

impl RequestContext {
    /// Runs `future` with a fresh context built from `init`.
    pub async fn run<F>(init: ContextInit, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(Arc::new(ContextStore::new(init)), future).await
    }

    /// The active context.
    ///
    /// # Errors
    ///
    /// `NoContext` when called outside of [`run`](Self::run).
    pub fn store() -> Result<Arc<ContextStore>, RpcError> {
        CURRENT
            .try_with(Arc::clone)
            .map_err(|_| RpcError::no_context())
    }

    pub fn is_active() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }

    /// Wraps `future` so it runs inside the current context wherever it is
    /// polled, e.g. in a spawned task.
    pub fn scope<F>(future: F) -> Result<impl Future<Output = F::Output>, RpcError>
    where
        F: Future,
    {
        let store = Self::store()?;
        Ok(CURRENT.scope(store, future))
    }

    pub fn env(name: &str) -> Result<Option<String>, RpcError> {
        Ok(Self::store()?.env().get(name).cloned())
    }

    pub fn request() -> Result<RequestInfo, RpcError> {
        Ok(Self::store()?.request().clone())
    }

    pub fn lang() -> Result<String, RpcError> {
        Ok(Self::store()?.lang())
    }

    pub fn set_lang(lang: impl Into<String>) -> Result<(), RpcError> {
        Self::store()?.set_lang(lang);
        Ok(())
    }

    pub fn route() -> Result<Option<Route>, RpcError> {
        Ok(Self::store()?.route())
    }

    pub fn set_route(route: Route) -> Result<(), RpcError> {
        Self::store()?.set_route(route);
        Ok(())
    }

    pub fn merge_response_headers(headers: HeaderMap) -> Result<(), RpcError> {
        Self::store()?.merge_response_headers(headers);
        Ok(())
    }

    pub fn response_headers() -> Result<HeaderMap, RpcError> {
        Ok(Self::store()?.response_headers())
    }
}
