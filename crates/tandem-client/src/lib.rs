//! Tandem Client
//!
//! This crate provides the client half of Tandem:
//!
//! - [`Transport`] / [`HttpTransport`]: one envelope in, one decoded body out,
//!   with abort wiring and error normalization
//! - [`RpcClient`]: binds method names to calls over a transport and tracks
//!   in-flight calls so they can be aborted
//! - [`Resource`]: a stateful, observable, debounced and cancellable unit
//!   wrapping one `(method, arguments)` pair
//!
//! # Example
//!
//! ```no_run
//! use tandem_client::{ClientConfig, RpcClient};
//! use serde_json::{json, Value};
//!
//! # async fn demo() -> Result<(), tandem_common::RpcError> {
//! let client = RpcClient::new(ClientConfig::new("http://127.0.0.1:8787/api/rpc"))?;
//! let greeting = client.lazy_resource::<Value>("hello", vec![json!({"message": "World"})]);
//!
//! greeting.fetch().await?;
//! assert_eq!(greeting.get_state().data.unwrap()["message"], "Hello, World!");
//! # Ok(())
//! # }
//! ```

pub mod abort;
pub mod client;
pub mod config;
pub mod pending;
pub mod resource;
pub mod transport;

#[cfg(test)]
mod testing;

pub use abort::{AbortController, AbortSignal};
pub use client::{PendingCall, RpcClient};
pub use config::{ClientConfig, DEFAULT_DEBOUNCE, DEFAULT_RPC_PATH, DEFAULT_URL};
pub use pending::{CallId, PendingRegistry};
pub use resource::{Resource, ResourceEvent, ResourceState, Subscription};
pub use transport::{HeaderProvider, HttpTransport, Transport};
