//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the admission proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API the admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Client and user identity extraction.
    pub identity: IdentityConfig,

    /// User-agent allow list.
    pub user_agents: UserAgentConfig,

    /// CORS response headers.
    pub cors: CorsConfig,

    /// Persistent user store backend.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API (scheme and authority).
    pub url: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per client per window. Must be at least 1.
    pub requests: u32,

    /// Window length in milliseconds.
    pub period_ms: u64,

    /// How often stale windows are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Client ids that bypass the limiter entirely.
    pub exempt_clients: Vec<String>,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 50,
            period_ms: 15_000,
            sweep_interval_secs: 60,
            exempt_clients: Vec::new(),
        }
    }
}

/// Identity extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Forwarding headers trusted for the client address, highest priority first.
    pub trusted_headers: Vec<String>,

    /// Header carrying the account-level user id.
    pub user_id_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trusted_headers: vec!["cf-connecting-ip".to_string(), "x-forwarded-for".to_string()],
            user_id_header: "userid".to_string(),
        }
    }
}

/// User-agent filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Substrings, any of which admits a user agent. Empty admits all.
    pub allowed: Vec<String>,
}

/// CORS header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origin: String,
    pub allow_headers: String,
    pub allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: "*".to_string(),
            allow_headers: "*".to_string(),
            allow_methods: "*".to_string(),
        }
    }
}

/// Which user store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Users listed in `store.users`, held in memory.
    #[default]
    Memory,
    /// A JSON array of user records at `store.path`.
    JsonFile,
}

/// User store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Path to the user file (json_file backend).
    pub path: Option<String>,

    /// Seed users (memory backend).
    pub users: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
