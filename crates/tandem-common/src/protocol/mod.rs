pub mod envelope;
pub mod error;


pub use envelope::{DecodeError, ErrorObject, Outcome, RpcRequest, RpcResponse};
pub use error::{codes, ErrorKind, Result, RpcError};
