//! HTTP Transport Utilities
//!
//! This module turns envelopes and errors into HTTP responses.
//!
//! # Status Codes
//!
//! Envelope responses are always sent with status `200`: the embedded
//! `error.code` is what consumers inspect. Only failures that never reach the
//! dispatcher (unknown routes, page errors) use a non-`200` status.
//!
//! # Example
//!
//! ```
//! use tandem_common::transport::HttpCodec;
//! use tandem_common::{RpcError, RpcResponse};
//! use hyper::header::HeaderMap;
//! use serde_json::json;
//!
//! let response = RpcResponse::from_error(json!(1), &RpcError::method_not_found());
//! let http_response = HttpCodec::to_http_response(&response, HeaderMap::new());
//! assert_eq!(http_response.status(), 200);
//! ```

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use crate::protocol::{RpcError, RpcResponse};

/// Content type of every envelope.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// HTTP conversion helpers.
pub struct HttpCodec;

impl HttpCodec {
    /// Creates the `200` HTTP response carrying a response envelope.
    ///
    /// `headers` are merged over the defaults, so a header accumulated while
    /// handling the request (a rotated session cookie, say) reaches the client.
    pub fn to_http_response(response: &RpcResponse, headers: HeaderMap) -> HyperResponse {
        let body = serde_json::to_vec(response).unwrap_or_default();
        Self::build(StatusCode::OK, JSON_CONTENT_TYPE, body, headers)
    }

    /// Creates a non-envelope error response whose status follows the error code.
    ///
    /// The body is the wire error object, `{"code": ..., "message": ...}`.
    pub fn to_http_error(error: &RpcError, headers: HeaderMap) -> HyperResponse {
        let status = StatusCode::from_u16(error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_vec(&error.to_error_object()).unwrap_or_default();
        Self::build(status, JSON_CONTENT_TYPE, body, headers)
    }

    /// Creates a `200` HTML response with an opaque rendered body.
    pub fn to_html_response(body: String, headers: HeaderMap) -> HyperResponse {
        Self::build(StatusCode::OK, "text/html; charset=utf-8", body.into_bytes(), headers)
    }

    fn build(
        status: StatusCode,
        content_type: &'static str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;

        let target = response.headers_mut();
        target.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        merge_headers(target, headers);

        response
    }
}

/// Merges `overrides` into `base`.
///
/// For every header name present in `overrides`, all of its values replace
/// all existing values in `base`. Multiple values for one name in
/// `overrides` (several `set-cookie` lines) are all kept.
pub fn merge_headers(base: &mut HeaderMap, overrides: HeaderMap) {
    let mut current = None;
    for (name, value) in overrides {
        match name {
            Some(name) => {
                base.insert(name.clone(), value);
                current = Some(name);
            }
            None => {
                if let Some(name) = &current {
                    base.append(name.clone(), value);
                }
            }
        }
    }
}
