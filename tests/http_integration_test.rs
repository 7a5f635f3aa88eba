//! HTTP Integration Tests
//!
//! Real server, real client, real sockets:
//!
//! 1. Lazy resource fetch against the root `hello` method
//! 2. Debounced argument bursts collapsing into one server call
//! 3. Concurrent signins keeping their response headers apart
//! 4. Error envelopes for unknown methods and failing handlers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tandem::client::{ClientConfig, RpcClient};
use tandem::common::ErrorKind;
use tandem::server::{
    root_methods, CookieAuth, HttpServer, MethodRegistry, Params, RequestContext, ServerConfig,
};
use tokio::net::TcpListener;

// ============================================================================
// Test Helpers
// ============================================================================

async fn start(server: HttpServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    addr
}

fn rpc_url(addr: SocketAddr) -> String {
    format!("http://{}/api/rpc", addr)
}

/// Root methods plus an `echo` method that counts its invocations.
fn counting_server(config: ServerConfig, calls: Arc<AtomicUsize>) -> HttpServer {
    let auth = Arc::new(CookieAuth::from_config(&config));
    let echo = MethodRegistry::new()
        .register("echo", move |params: Params| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let value: Value = params.get(0)?;
                Ok(value)
            }
        })
        .register("fail", |_params: Params| async {
            Err::<Value, _>(anyhow::anyhow!("database exploded"))
        });

    HttpServer::new(config, root_methods(auth).merge(echo))
}

// ============================================================================
// Resources over HTTP
// ============================================================================

#[tokio::test]
async fn test_lazy_resource_hello_over_http() {
    let addr = start(HttpServer::from_config(ServerConfig::default())).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let hello = client.lazy_resource::<Value>("hello", vec![json!({"message": "World"})]);
    assert_eq!(hello.get_state().index, 0);

    let data = hello.fetch().await.unwrap();
    assert_eq!(data, Some(json!({"message": "Hello, World!"})));

    let state = hello.get_state();
    assert_eq!(state.index, 1);
    assert!(state.loaded);
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_update_args_burst_makes_one_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start(counting_server(ServerConfig::default(), calls.clone())).await;
    let client = RpcClient::new(
        ClientConfig::new(rpc_url(addr)).with_debounce(Duration::from_millis(50)),
    )
    .unwrap();

    let echo = client.lazy_resource::<Value>("echo", vec![json!("initial")]);
    echo.update_args(vec![json!("A")]);
    echo.update_args(vec![json!("B")]);

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let state = echo.get_state();
    assert_eq!(state.data, Some(json!("B")));
    assert_eq!(state.index, 1);
}

#[tokio::test]
async fn test_eager_resource_fetches_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start(counting_server(ServerConfig::default(), calls.clone())).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let echo = client.resource::<Value>("echo", vec![json!("x")]);
    let _again = echo.clone();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(echo.get_state().data, Some(json!("x")));
}

#[tokio::test]
async fn test_failed_fetch_keeps_data_over_http() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start(counting_server(ServerConfig::default(), calls)).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let echo = client.lazy_resource::<Value>("echo", vec![json!("kept")]);
    echo.fetch().await.unwrap();

    // Missing argument: the handler rejects it with 400.
    let error = echo.fetch_with(vec![]).await.unwrap_err();
    assert_eq!(error.code, 400);

    let state = echo.get_state();
    assert_eq!(state.data, Some(json!("kept")));
    assert_eq!(state.error.map(|e| e.code), Some(400));
    assert_eq!(state.index, 2);
}

// ============================================================================
// Error Handling
// ============================================================================

#[tokio::test]
async fn test_unknown_method_over_http() {
    let addr = start(HttpServer::from_config(ServerConfig::default())).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let error = client.call("missing", vec![]).await.unwrap_err();
    assert_eq!(error.code, 404);
    assert_eq!(error.message, "Method not found");
}

#[tokio::test]
async fn test_internal_error_is_hidden_unless_debug() {
    let calls = Arc::new(AtomicUsize::new(0));
    let addr = start(counting_server(ServerConfig::default(), calls.clone())).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let error = client.call("fail", vec![]).await.unwrap_err();
    assert_eq!(error.code, 500);
    assert_eq!(error.message, "Internal Server Error");
    assert!(error.data.is_none());

    let addr = start(counting_server(ServerConfig::default().with_debug(true), calls)).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let error = client.call("fail", vec![]).await.unwrap_err();
    assert_eq!(error.code, 500);
    let data = error.data.unwrap();
    assert!(data["message"].as_str().unwrap().contains("database exploded"));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();
    let error = client.call("hello", vec![json!({"message": "World"})]).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Transport);
    assert_eq!(error.code, 0);
}

#[tokio::test]
async fn test_aborted_call_over_http() {
    let slow = MethodRegistry::new().register("slow", |_params: Params| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!(null))
    });
    let addr = start(HttpServer::new(ServerConfig::default(), slow)).await;
    let client = RpcClient::new(ClientConfig::new(rpc_url(addr))).unwrap();

    let call = client.start("slow", vec![]);
    assert_eq!(client.pending_count(), 1);
    call.abort();

    let error = call.await.unwrap_err();
    assert!(error.is_abort());
    assert_eq!(error.code, 499);
    assert_eq!(client.pending_count(), 0);
}

// ============================================================================
// Request Context
// ============================================================================

#[tokio::test]
async fn test_concurrent_signins_keep_headers_apart() {
    let addr = start(HttpServer::from_config(ServerConfig::default())).await;
    let http = reqwest::Client::new();

    let signin = |email: &'static str| {
        let http = http.clone();
        async move {
            let response = http
                .post(rpc_url(addr))
                .json(&json!({
                    "id": 1,
                    "method": "signin",
                    "params": [{"email": email, "password": "pw"}]
                }))
                .send()
                .await
                .unwrap();

            let cookies: Vec<String> = response
                .headers()
                .get_all("set-cookie")
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect();
            let body: Value = response.json().await.unwrap();
            (cookies, body)
        }
    };

    let ((cookies_a, body_a), (cookies_b, body_b)) =
        tokio::join!(signin("a@example.com"), signin("b@example.com"));

    assert_eq!(body_a["result"]["email"], "a@example.com");
    assert_eq!(body_b["result"]["email"], "b@example.com");

    assert_eq!(cookies_a.len(), 1);
    assert_eq!(cookies_b.len(), 1);

    let token_a = body_a["result"]["token"].as_str().unwrap();
    let token_b = body_b["result"]["token"].as_str().unwrap();
    assert_ne!(token_a, token_b);
    assert!(cookies_a[0].contains(token_a));
    assert!(cookies_b[0].contains(token_b));
}

#[tokio::test]
async fn test_handlers_read_env_and_lang() {
    let config = ServerConfig::default()
        .with_supported_langs(["en", "fr"])
        .with_env("REGION", "eu-west");
    let inspect = MethodRegistry::new().register("inspect", |_params: Params| async {
        Ok(json!({
            "region": RequestContext::env("REGION")?,
            "lang": RequestContext::lang()?,
        }))
    });
    let addr = start(HttpServer::new(config, inspect)).await;

    let response = reqwest::Client::new()
        .post(rpc_url(addr))
        .header("accept-language", "fr-CA;q=0.9, en;q=0.8")
        .json(&json!({"id": 7, "method": "inspect", "params": []}))
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": 7, "result": {"region": "eu-west", "lang": "fr"}}));
}
