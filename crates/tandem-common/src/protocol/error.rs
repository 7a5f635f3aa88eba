//! Normalized RPC Errors
//!
//! Every failure in Tandem, whether it comes from the network, from a
//! malformed envelope, or from a method that raised it on purpose, surfaces
//! as a single [`RpcError`] carrying a numeric code, a message and optional
//! structured context. The [`ErrorKind`] tag records where it came from so
//! callers can tell a cancellation apart from a genuine failure without
//! inspecting the message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::envelope::ErrorObject;

/// Numeric codes carried in `error.code`.
pub mod codes {
    /// Transport failure that produced no HTTP status (connection refused, DNS, ...)
    pub const NETWORK_ERROR: i64 = 0;
    /// The envelope was not well formed
    pub const BAD_REQUEST: i64 = 400;
    /// The caller is not authenticated
    pub const UNAUTHORIZED: i64 = 401;
    /// The method does not exist in the registry or the remote contract
    pub const METHOD_NOT_FOUND: i64 = 404;
    /// The call was cancelled before it settled
    pub const ABORTED: i64 = 499;
    /// Unclassified failure inside a dispatched method
    pub const INTERNAL_ERROR: i64 = 500;
    /// The peer answered with something that is not a response envelope
    pub const BAD_GATEWAY: i64 = 502;
}

/// Origin of an [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure or non-success HTTP status
    Transport,
    /// Malformed response envelope
    Protocol,
    /// Malformed request envelope or invalid parameters
    BadRequest,
    /// Unknown method name
    MethodNotFound,
    /// Raised intentionally by a method, or received in a response envelope
    Application,
    /// Cancellation; never a user-visible failure
    Aborted,
    /// Request context accessed outside of an active request
    NoContext,
    /// Unclassified failure degraded at the dispatcher boundary
    Internal,
}

/// The normalized error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(kind: ErrorKind, code: i64, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Non-success HTTP status returned by the server.
    pub fn transport(status: u16, status_text: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, i64::from(status), status_text)
    }

    /// Failure before any HTTP status was received.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, codes::NETWORK_ERROR, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, codes::BAD_GATEWAY, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, codes::BAD_REQUEST, message)
    }

    pub fn method_not_found() -> Self {
        Self::new(ErrorKind::MethodNotFound, codes::METHOD_NOT_FOUND, "Method not found")
    }

    /// An error a method raises on purpose; passed through the dispatcher untouched.
    pub fn application(code: i64, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Application, code, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::application(codes::UNAUTHORIZED, message)
    }

    pub fn aborted() -> Self {
        Self::new(ErrorKind::Aborted, codes::ABORTED, "The operation was aborted")
    }

    pub fn no_context() -> Self {
        Self::new(ErrorKind::NoContext, codes::INTERNAL_ERROR, "No request context")
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, codes::INTERNAL_ERROR, "Internal Server Error")
    }

    /// Attaches structured context, sent as `error.data` on the wire.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_abort(&self) -> bool {
        self.kind == ErrorKind::Aborted
    }

    /// HTTP status to use when this error must become a whole HTTP response
    /// (page handling); envelope responses always use `200`.
    pub fn http_status(&self) -> u16 {
        match u16::try_from(self.code) {
            Ok(status) if (400..=599).contains(&status) => status,
            _ => 500,
        }
    }

    /// Wire form of this error.
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            code: self.code,
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }
}

impl From<ErrorObject> for RpcError {
    fn from(error: ErrorObject) -> Self {
        Self {
            kind: ErrorKind::Application,
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::protocol(format!("Invalid JSON: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
