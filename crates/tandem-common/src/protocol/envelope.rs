//! RPC Envelopes
//!
//! This module defines the request and response envelopes exchanged between
//! the Tandem client and server.
//!
//! # Request
//!
//! `{"id": ..., "method": "...", "params": [...]}`
//!
//! - `id` correlates the response to the request. It may be omitted (or
//!   `null`) for fire-and-forget calls.
//! - `params` is the ordered argument list. When absent it is empty.
//!
//! # Response
//!
//! Exactly one of `{"id": ..., "result": ...}` or
//! `{"id": ..., "error": {"code": ..., "message": "...", "data": ...}}`.
//! A `result` of `null` is a valid success.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RpcError;

/// Request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Correlation id, `None` for fire-and-forget
    pub id: Option<Value>,
    /// Name of the method to invoke
    pub method: String,
    /// Positional arguments
    pub params: Vec<Value>,
}

/// Failure to decode a request envelope.
///
/// Carries the `id` member when it could still be read, so the error
/// response can be correlated.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeError {
    pub id: Option<Value>,
    pub error: RpcError,
}

impl RpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Creates a request without a correlation id.
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Decodes a raw request body.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] holding a `BadRequest` error when the body is
    /// not JSON, not an object, has no method name, or has non-array params.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| DecodeError {
            id: None,
            error: RpcError::bad_request(format!("Invalid JSON: {}", e)),
        })?;

        let id = value.get("id").filter(|id| !id.is_null()).cloned();
        Self::from_value(value).map_err(|error| DecodeError { id, error })
    }

    /// Validates a decoded JSON value as a request envelope.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Object(mut object) = value else {
            return Err(RpcError::bad_request("Envelope must be a JSON object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            Some(Value::String(_)) | None => {
                return Err(RpcError::bad_request("Missing method name"));
            }
            Some(_) => return Err(RpcError::bad_request("Method name must be a string")),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(params)) => params,
            Some(_) => return Err(RpcError::bad_request("Params must be an array")),
        };

        let id = object.remove("id").filter(|id| !id.is_null());

        Ok(Self { id, method, params })
    }
}

impl Serialize for RpcRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.id.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("method", &self.method)?;
        map.serialize_entry("params", &self.params)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for RpcRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(|e| de::Error::custom(e.message))
    }
}

/// Wire form of an error, the `error` member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The single outcome a response carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// Echo of the request id, `null` when the request had none
    pub id: Value,
    pub outcome: Outcome,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Value, error: ErrorObject) -> Self {
        Self {
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Builds a failure response from a normalized error.
    pub fn from_error(id: Value, error: &RpcError) -> Self {
        Self::failure(id, error.to_error_object())
    }

    /// Validates a decoded JSON value as a response envelope.
    ///
    /// # Errors
    ///
    /// Returns a `Protocol` error when the value is not an object, or carries
    /// neither or both of `result` and `error`.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        let Value::Object(mut object) = value else {
            return Err(RpcError::protocol("Response must be a JSON object"));
        };

        let id = object.remove("id").unwrap_or(Value::Null);
        let error = take_present(&mut object, "error");
        let result = object.remove("result");

        let outcome = match (result, error) {
            (Some(result), None) => Outcome::Result(result),
            (None, Some(error)) => Outcome::Error(
                serde_json::from_value(error)
                    .map_err(|e| RpcError::protocol(format!("Malformed error object: {}", e)))?,
            ),
            (Some(_), Some(_)) => {
                return Err(RpcError::protocol("Response carries both result and error"));
            }
            (None, None) => {
                return Err(RpcError::protocol("Response carries neither result nor error"));
            }
        };

        Ok(Self { id, outcome })
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(result) => Some(result),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Result(_))
    }

    /// Converts into the result value, or the error as an `Application` [`RpcError`].
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            Outcome::Result(result) => Ok(result),
            Outcome::Error(error) => Err(error.into()),
        }
    }
}

// `"error": null` is treated as absent.
fn take_present(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|value| !value.is_null())
}

impl Serialize for RpcResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("id", &self.id)?;
        match &self.outcome {
            Outcome::Result(result) => map.serialize_entry("result", result)?,
            Outcome::Error(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RpcResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(|e| de::Error::custom(e.message))
    }
}
