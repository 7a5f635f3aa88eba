//! Tandem Common Types
//!
//! This crate provides the wire protocol and the normalized error type shared
//! by the Tandem RPC client and server.
//!
//! # Overview
//!
//! Tandem is a typed remote-procedure-call layer: a client posts a JSON
//! envelope naming a method and its positional arguments, the server
//! dispatches it against a method registry and answers with exactly one of
//! a result or an error. Both halves agree on the types in this crate:
//!
//! - **Protocol Layer**: request/response envelopes and [`RpcError`], the one
//!   error shape every failure is normalized into
//! - **Transport Layer**: helpers that turn envelopes into HTTP responses
//!
//! # Wire Format
//!
//! - **Request**: `{"id": 1, "method": "hello", "params": [{"message": "World"}]}`
//! - **Success**: `{"id": 1, "result": {"message": "Hello, World!"}}`
//! - **Failure**: `{"id": 1, "error": {"code": 404, "message": "Method not found"}}`
//!
//! The HTTP status is `200` for every envelope-level outcome; `error.code`
//! carries the semantic classification.
//!
//! # Example
//!
//! ```
//! use tandem_common::{RpcRequest, RpcResponse};
//! use serde_json::json;
//!
//! let request = RpcRequest::new(1, "hello", vec![json!({"message": "World"})]);
//! let response = RpcResponse::success(json!(1), json!({"message": "Hello, World!"}));
//! assert_eq!(response.into_result().unwrap()["message"], "Hello, World!");
//! # let _ = request;
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
