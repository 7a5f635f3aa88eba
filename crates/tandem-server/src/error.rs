use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while configuring or running the server.
///
/// Failures inside a dispatched call never show up here: they become an
/// error envelope instead.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
