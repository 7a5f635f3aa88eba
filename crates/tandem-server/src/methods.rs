//! Root method set: `hello`, `signin`, `signout`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{AuthCapability, Credentials};
use crate::context::RequestContext;
use crate::dispatcher::{MethodRegistry, Params};

#[derive(Debug, Deserialize)]
struct HelloArgs {
    message: String,
}

/// Builds the root methods over `auth`.
pub fn root_methods(auth: Arc<dyn AuthCapability>) -> MethodRegistry {
    let hello_auth = auth.clone();
    let signin_auth = auth.clone();
    let signout_auth = auth;

    MethodRegistry::new()
        .register("hello", move |params: Params| {
            let auth = hello_auth.clone();
            async move { hello(auth.as_ref(), params).await }
        })
        .register("signin", move |params: Params| {
            let auth = signin_auth.clone();
            async move { signin(auth.as_ref(), params).await }
        })
        .register("signout", move |_params: Params| {
            let auth = signout_auth.clone();
            async move { signout(auth.as_ref()).await }
        })
}

/// Greets the caller, naming them when the request carries a valid session.
async fn hello(auth: &dyn AuthCapability, params: Params) -> anyhow::Result<Value> {
    let HelloArgs { message } = params.get(0)?;

    let headers = RequestContext::request()
        .map(|request| request.headers)
        .unwrap_or_default();

    let greeting = match auth.authenticate(&headers).await {
        Ok(session) => format!("Hello, {} ({})!", message, session.email),
        Err(_) => format!("Hello, {}!", message),
    };

    Ok(json!({ "message": greeting }))
}

/// Issues a session and installs its cookie on the response.
async fn signin(auth: &dyn AuthCapability, params: Params) -> anyhow::Result<Value> {
    let credentials: Credentials = params.get(0)?;
    let email = credentials.email.clone();

    let signed = auth.sign(credentials).await?;
    RequestContext::merge_response_headers(signed.headers)?;

    Ok(json!({ "email": email, "token": signed.token }))
}

/// Revokes the session and expires its cookie on the response.
async fn signout(auth: &dyn AuthCapability) -> anyhow::Result<Value> {
    let headers = auth.destroy().await?;
    RequestContext::merge_response_headers(headers)?;

    Ok(json!({ "success": true }))
}
