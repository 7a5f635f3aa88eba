//! # Tandem CLI
//!
//! Command-line interface for Tandem:
//!
//! - `tandem serve`: run the HTTP server with the root methods
//! - `tandem call`: make one RPC call and print the raw JSON result
//!
//! The helpers here are shared by the binary and its tests.

use anyhow::Result;
use serde_json::Value;
use tandem_client::{ClientConfig, RpcClient};
use tandem_server::ServerConfig;

/// Validates that a URL string starts with http:// or https://
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

/// Parses the `--args` JSON into positional parameters.
///
/// A JSON array is taken as the parameter list; any other value becomes
/// the single parameter.
pub fn parse_call_args(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;

    Ok(match value {
        Value::Array(params) => params,
        other => vec![other],
    })
}

/// Flag values for `tandem serve`; unset flags leave the environment value.
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub debug: bool,
    pub secret: Option<String>,
    pub rpc_path: Option<String>,
}

/// Applies CLI flags over `config` (flag > env var > default).
pub fn apply_overrides(mut config: ServerConfig, overrides: ServeOverrides) -> Result<ServerConfig> {
    if let Some(bind) = overrides.bind {
        config.bind = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", bind, e))?;
    }
    if overrides.debug {
        config.debug = true;
    }
    if let Some(secret) = overrides.secret {
        config.auth_secret = secret;
    }
    if let Some(rpc_path) = overrides.rpc_path {
        config = config.with_rpc_path(rpc_path)?;
    }
    Ok(config)
}

/// Makes one call against the RPC endpoint at `url`.
pub async fn call(url: &str, method: &str, params: Vec<Value>) -> Result<Value> {
    validate_http_url(url, "server address")?;
    let client = RpcClient::new(ClientConfig::new(url))?;
    Ok(client.call(method, params).await?)
}
