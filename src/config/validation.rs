//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limit >= 1, period > 0)
//! - Check header names, header values and the upstream URL parse
//! - The upstream must be plain http; TLS origination is left to an egress proxy
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Uri};
use thiserror::Error;

use crate::config::schema::{GatewayConfig, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rate_limit.requests must be at least 1")]
    ZeroRateLimit,

    #[error("rate_limit.period_ms must be greater than 0")]
    ZeroPeriod,

    #[error("rate_limit.sweep_interval_secs must be greater than 0")]
    ZeroSweepInterval,

    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("upstream.url '{0}' must be an absolute http:// URL")]
    UpstreamUrl(String),

    #[error("invalid header name '{0}' in {1}")]
    HeaderName(String, &'static str),

    #[error("invalid header value '{0}' in {1}")]
    HeaderValue(String, &'static str),

    #[error("store.path is required for the json_file backend")]
    MissingStorePath,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.requests == 0 {
        errors.push(ValidationError::ZeroRateLimit);
    }
    if config.rate_limit.period_ms == 0 {
        errors.push(ValidationError::ZeroPeriod);
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match config.upstream.url.parse::<Uri>() {
        Ok(uri)
            if uri.scheme_str() == Some("http") && uri.authority().is_some() => {}
        _ => errors.push(ValidationError::UpstreamUrl(config.upstream.url.clone())),
    }

    for name in &config.identity.trusted_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(name.clone(), "identity.trusted_headers"));
        }
    }
    if HeaderName::from_bytes(config.identity.user_id_header.as_bytes()).is_err() {
        errors.push(ValidationError::HeaderName(
            config.identity.user_id_header.clone(),
            "identity.user_id_header",
        ));
    }

    if config.cors.enabled {
        for (value, field) in [
            (&config.cors.allow_origin, "cors.allow_origin"),
            (&config.cors.allow_headers, "cors.allow_headers"),
            (&config.cors.allow_methods, "cors.allow_methods"),
        ] {
            if HeaderValue::from_str(value).is_err() {
                errors.push(ValidationError::HeaderValue(value.clone(), field));
            }
        }
    }

    if config.store.backend == StoreBackend::JsonFile && config.store.path.is_none() {
        errors.push(ValidationError::MissingStorePath);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
