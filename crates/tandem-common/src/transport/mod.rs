//! Tandem Transport Helpers
//!
//! HTTP-side helpers shared by the server and tests.
//!
//! # Components
//!
//! - **[`HttpCodec`]**: Converts envelopes and errors into HTTP responses
//! - **[`HyperResponse`]**: Type alias for responses with a full body

pub mod http;

pub use http::{merge_headers, HttpCodec, HyperResponse, JSON_CONTENT_TYPE};
