//! HTTP Server
//!
//! Serves the RPC endpoint and the page fallback with axum:
//!
//! - `POST <rpc_path>`: dispatches the envelope inside a fresh request
//!   context and answers `200` with the response envelope plus every header
//!   accumulated in the context
//! - `GET /__health`: returns `OK`
//! - any other `GET`: page routing, rendered inside a request context with
//!   the matched route stored in it
//!
//! Other methods on the RPC path get `405`. CORS is permissive.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper::header::{ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE};
use tandem_common::transport::HttpCodec;
use tandem_common::RpcError;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::CookieAuth;
use crate::config::ServerConfig;
use crate::context::{ContextInit, RequestContext, RequestInfo};
use crate::dispatcher::{Dispatcher, MethodRegistry};
use crate::error::ServerError;
use crate::locale::negotiate_lang;
use crate::methods::root_methods;
use crate::routes::{PageRouter, Route};

/// Renders a page body for a matched route.
pub type PageHandler = Arc<dyn Fn(&Route) -> String + Send + Sync>;

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    pages: Arc<PageRouter<PageHandler>>,
    config: Arc<ServerConfig>,
}

/// HTTP front of the dispatcher.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Creates a server exposing `registry`, with no pages.
    pub fn new(config: ServerConfig, registry: MethodRegistry) -> Self {
        let dispatcher = Dispatcher::new(registry).with_debug(config.debug);
        Self {
            state: AppState {
                dispatcher,
                pages: Arc::new(PageRouter::new()),
                config: Arc::new(config),
            },
        }
    }

    /// Creates a server exposing the root methods with cookie auth and the
    /// default pages.
    pub fn from_config(config: ServerConfig) -> Self {
        let auth = Arc::new(CookieAuth::from_config(&config));
        Self::new(config, root_methods(auth)).with_pages(default_pages())
    }

    pub fn with_pages(mut self, pages: PageRouter<PageHandler>) -> Self {
        self.state.pages = Arc::new(pages);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.state.dispatcher
    }

    /// Builds the axum application.
    pub fn router(&self) -> axum::Router {
        let rpc_route = axum::routing::post(handle_rpc).fallback(method_not_allowed);

        axum::Router::new()
            .route(&self.state.config.rpc_path, rpc_route)
            .route("/__health", axum::routing::get(health_check))
            .fallback(handle_page)
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Binds `addr` and serves until the process stops.
    pub async fn run(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();

        info!(
            "HTTP server listening on {} (rpc path {}, methods: {})",
            listener.local_addr()?,
            self.state.config.rpc_path,
            self.state.dispatcher.method_names().join(", ")
        );

        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Pages served by [`HttpServer::from_config`]: `/` and `/:id`.
pub fn default_pages() -> PageRouter<PageHandler> {
    let home: PageHandler = Arc::new(|route: &Route| {
        let subject = route
            .path_params
            .get("id")
            .map(String::as_str)
            .unwrap_or("home");
        format!(
            "<!doctype html><html><head><title>tandem</title></head>\
             <body><h1>tandem</h1><p>{}</p></body></html>",
            escape_html(subject)
        )
    });

    PageRouter::new().add("/", home.clone()).add("/:id", home)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn context_init(config: &ServerConfig, method: Method, uri: Uri, headers: HeaderMap) -> ContextInit {
    let lang = negotiate_lang(
        headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()),
        &config.supported_langs,
    );
    ContextInit {
        env: config.env.clone(),
        request: RequestInfo::new(method, uri, headers),
        lang,
    }
}

/// Handles RPC POST requests.
async fn handle_rpc(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let init = context_init(&state.config, method, uri, headers);

    RequestContext::run(init, async move {
        let response = state.dispatcher.handle(&body).await;
        let headers = RequestContext::response_headers().unwrap_or_default();
        HttpCodec::to_http_response(&response, headers)
    })
    .await
    .into_response()
}

/// Handles every request no other route matched.
async fn handle_page(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return method_not_allowed().await;
    }

    let init = context_init(&state.config, method, uri.clone(), headers);

    RequestContext::run(init, async move {
        let Some((page, route)) = state.pages.match_url(uri.path(), uri.query()) else {
            let headers = RequestContext::response_headers().unwrap_or_default();
            return HttpCodec::to_http_error(&RpcError::application(404, "Not Found"), headers);
        };

        tracing::debug!(path = %route.raw_path, "Rendering page");
        if let Err(err) = RequestContext::set_route(route.clone()) {
            tracing::warn!(error = %err, "Failed to store page route");
        }
        let body = page(&route);

        let mut overrides = HeaderMap::new();
        overrides.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
        overrides.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));

        let mut headers = RequestContext::response_headers().unwrap_or_default();
        tandem_common::transport::merge_headers(&mut headers, overrides);
        HttpCodec::to_html_response(body, headers)
    })
    .await
    .into_response()
}

/// Answers `405` for a method the path does not accept.
async fn method_not_allowed() -> Response {
    let error = RpcError::application(405, "Method Not Allowed");
    HttpCodec::to_http_error(&error, HeaderMap::new()).into_response()
}

/// Handles health check GET requests.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
