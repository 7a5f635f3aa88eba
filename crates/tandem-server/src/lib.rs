//! Tandem Server
//!
//! This crate provides the server half of Tandem:
//!
//! - [`RequestContext`]: per-request storage reachable from any code running
//!   while the request is handled, including an accumulator of response
//!   headers
//! - [`MethodRegistry`] / [`Dispatcher`]: named methods, executed with error
//!   classification into wire-safe envelopes
//! - [`HttpServer`]: the axum front serving the RPC endpoint and pages
//! - [`CookieAuth`] and the root methods (`hello`, `signin`, `signout`)

pub mod auth;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http_server;
pub mod locale;
pub mod methods;
pub mod routes;

pub use auth::{AuthCapability, CookieAuth, Credentials, Session, SignedSession};
pub use config::ServerConfig;
pub use context::{ContextInit, ContextStore, RequestContext, RequestInfo};
pub use dispatcher::{Dispatcher, HandlerFuture, MethodRegistry, Params};
pub use error::ServerError;
pub use http_server::{default_pages, HttpServer, PageHandler};
pub use locale::negotiate_lang;
pub use methods::root_methods;
pub use routes::{PageRouter, Route};
