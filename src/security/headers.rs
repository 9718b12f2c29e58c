//! CORS response headers.
//!
//! Every response, rejections included, is annotated so browser clients can
//! read the JSON error bodies.

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CorsConfig;

/// The `(name, value)` pairs written on each response.
pub fn cors_headers(config: &CorsConfig) -> Vec<(HeaderName, HeaderValue)> {
    if !config.enabled {
        return Vec::new();
    }

    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, &config.allow_origin),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, &config.allow_headers),
        (header::ACCESS_CONTROL_ALLOW_METHODS, &config.allow_methods),
    ]
    .into_iter()
    .map(|(name, value)| {
        let value = HeaderValue::from_str(value).unwrap_or_else(|_| {
            tracing::warn!(header = %name, value = %value, "Invalid CORS header value, using '*'");
            HeaderValue::from_static("*")
        });
        (name, value)
    })
    .collect()
}

/// Wrap `router` so every response carries the configured CORS headers.
pub fn apply_cors(router: Router, config: &CorsConfig) -> Router {
    cors_headers(config)
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(name, value))
        })
}
