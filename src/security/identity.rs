//! Client identity extraction.
//!
//! The client id keys the rate limiter. It is taken from the first trusted
//! forwarding header that carries a value, falling back to the socket
//! address, so traffic arriving through a reverse proxy is attributed to the
//! original client.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName};

use crate::config::IdentityConfig;

/// Network-level identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub user_agent: String,
}

/// Resolves [`ClientIdentity`] using an ordered list of trusted headers.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    trusted_headers: Vec<HeaderName>,
}

impl IdentityResolver {
    /// Build from an explicit precedence list, highest priority first.
    pub fn new(trusted_headers: Vec<HeaderName>) -> Self {
        Self { trusted_headers }
    }

    /// Build from configuration. Names that are not valid header names are
    /// skipped; validation reports them before this point.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let trusted_headers = config
            .trusted_headers
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect();
        Self::new(trusted_headers)
    }

    pub fn trusted_headers(&self) -> &[HeaderName] {
        &self.trusted_headers
    }

    pub fn resolve(&self, headers: &HeaderMap, remote: SocketAddr) -> ClientIdentity {
        let client_id = self
            .trusted_headers
            .iter()
            .find_map(|name| forwarded_client(headers, name))
            .unwrap_or_else(|| remote.ip().to_string());

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        ClientIdentity {
            client_id,
            user_agent,
        }
    }
}

/// First entry of a (possibly comma-separated) forwarding header.
fn forwarded_client(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
