//! Integration tests across the shared envelope, the dispatcher and the
//! request context, without sockets.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tandem::common::{ErrorKind, RpcRequest, RpcResponse};
use tandem::server::{
    root_methods, ContextInit, CookieAuth, Dispatcher, MethodRegistry, Params, RequestContext,
};

fn dispatcher() -> Dispatcher {
    let auth = Arc::new(CookieAuth::new("secret", "auth_token", Duration::from_secs(60)));
    let extra = MethodRegistry::new().register("whoami", |_params: Params| async move {
        let request = RequestContext::request()?;
        Ok(json!(request.uri.path()))
    });
    Dispatcher::new(root_methods(auth).merge(extra))
}

#[tokio::test]
async fn test_envelope_round_trip_through_dispatcher() {
    let request = RpcRequest::new(3, "hello", vec![json!({"message": "World"})]);
    let body = serde_json::to_vec(&request).unwrap();

    let response = dispatcher().handle(&body).await;
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire, json!({"id": 3, "result": {"message": "Hello, World!"}}));

    let decoded = RpcResponse::from_value(wire).unwrap();
    assert_eq!(decoded.into_result().unwrap()["message"], "Hello, World!");
}

#[tokio::test]
async fn test_missing_method_envelope() {
    let body = br#"{"id": 9, "method": "nope", "params": []}"#;
    let response = dispatcher().handle(body).await;

    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire, json!({"id": 9, "error": {"code": 404, "message": "Method not found"}}));

    let error = RpcResponse::from_value(wire).unwrap().into_result().unwrap_err();
    assert_eq!(error.code, 404);
}

#[tokio::test]
async fn test_context_is_required_outside_a_request() {
    let response = dispatcher()
        .dispatch(RpcRequest::new(1, "whoami", vec![]))
        .await;

    let error = response.error().unwrap();
    assert_eq!(error.code, 500);
    assert_eq!(error.message, "No request context");
}

#[tokio::test]
async fn test_concurrent_contexts_are_isolated() {
    let dispatcher = dispatcher();

    let run = |path: &'static str| {
        let dispatcher = dispatcher.clone();
        let mut init = ContextInit::default();
        init.request.uri = path.parse().unwrap();
        RequestContext::run(init, async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            dispatcher.dispatch(RpcRequest::new(1, "whoami", vec![])).await
        })
    };

    let (a, b) = tokio::join!(run("/a"), run("/b"));
    assert_eq!(a.result(), Some(&json!("/a")));
    assert_eq!(b.result(), Some(&json!("/b")));
}

#[tokio::test]
async fn test_signin_then_signout_headers_accumulate_per_request() {
    let dispatcher = dispatcher();

    let headers = RequestContext::run(ContextInit::default(), async {
        let signin = dispatcher
            .dispatch(RpcRequest::new(
                1,
                "signin",
                vec![json!({"email": "a@b.c", "password": "pw"})],
            ))
            .await;
        assert!(signin.is_success());

        let signout = dispatcher.dispatch(RpcRequest::new(2, "signout", vec![])).await;
        assert_eq!(signout.result(), Some(&json!({"success": true})));

        RequestContext::response_headers().unwrap()
    })
    .await;

    // The later write wins for the same header name.
    let cookie = headers.get("set-cookie").unwrap().to_str().unwrap();
    assert!(cookie.ends_with("Max-Age=0"));
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let response = dispatcher().handle(b"[1, 2, 3]").await;
    let error = response.into_result().unwrap_err();
    assert_eq!(error.code, 400);
    assert_ne!(error.kind, ErrorKind::Aborted);

    let response = dispatcher().handle(br#"{"id": 1, "method": "hello", "params": {}}"#).await;
    assert_eq!(response.error().unwrap().code, 400);
    assert_eq!(response.id, Value::from(1));
}
