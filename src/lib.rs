//! # Tandem
//!
//! Typed remote procedure calls between a client and a server, with an
//! observable, debounced, cancellable resource layer on the client and a
//! request-scoped context on the server.
//!
//! The workspace is split into:
//!
//! - [`common`]: wire envelopes and the normalized [`common::RpcError`]
//! - [`client`]: transport, RPC client and [`client::Resource`]
//! - [`server`]: request context, dispatcher, auth and the axum front
//!
//! # Example
//!
//! ```no_run
//! use tandem::client::{ClientConfig, RpcClient};
//! use tandem::server::{HttpServer, ServerConfig};
//! use serde_json::{json, Value};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//! let addr = listener.local_addr()?;
//! tokio::spawn(HttpServer::from_config(ServerConfig::default()).serve(listener));
//!
//! let client = RpcClient::new(ClientConfig::new(format!("http://{}/api/rpc", addr)))?;
//! let hello = client.lazy_resource::<Value>("hello", vec![json!({"message": "World"})]);
//! hello.fetch().await?;
//! assert_eq!(hello.get_state().index, 1);
//! # Ok(())
//! # }
//! ```

pub use tandem_client as client;
pub use tandem_common as common;
pub use tandem_server as server;
