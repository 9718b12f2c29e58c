//! Request admission layer for an API proxy.
//!
//! Every request is annotated with CORS headers, filtered by user agent,
//! rate limited per client, and authorized against a user store before it
//! is forwarded upstream.

pub mod admission;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use admission::{AdmissionDecision, AdmissionPipeline, Rejection};
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
