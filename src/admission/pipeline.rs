//! Ordered admission gate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, HeaderName};

use crate::admission::AdmissionDecision;
use crate::auth::{AuthorizationCache, UserStore};
use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::security::{IdentityResolver, RateLimiter, UserAgentFilter};

/// Composes the user-agent filter, rate limiter and authorization cache.
///
/// Stages run in that order and the first rejection wins. Later stages are
/// not consulted after a rejection, so their state is left untouched.
pub struct AdmissionPipeline {
    resolver: IdentityResolver,
    user_agents: UserAgentFilter,
    limiter: Arc<RateLimiter>,
    authorizer: Arc<AuthorizationCache>,
    user_id_header: HeaderName,
}

impl AdmissionPipeline {
    pub fn new(
        resolver: IdentityResolver,
        user_agents: UserAgentFilter,
        limiter: Arc<RateLimiter>,
        authorizer: Arc<AuthorizationCache>,
        user_id_header: HeaderName,
    ) -> Self {
        Self {
            resolver,
            user_agents,
            limiter,
            authorizer,
            user_id_header,
        }
    }

    /// Build every stage from configuration around the given store.
    pub fn from_config(config: &GatewayConfig, store: Arc<dyn UserStore>) -> Self {
        let user_id_header = HeaderName::from_bytes(config.identity.user_id_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static("userid"));

        Self::new(
            IdentityResolver::from_config(&config.identity),
            UserAgentFilter::from_config(&config.user_agents),
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            Arc::new(AuthorizationCache::new(store)),
            user_id_header,
        )
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn authorizer(&self) -> &Arc<AuthorizationCache> {
        &self.authorizer
    }

    /// Evaluate a request at the current instant.
    pub async fn evaluate(&self, headers: &HeaderMap, remote: SocketAddr) -> AdmissionDecision {
        self.evaluate_at(headers, remote, Instant::now()).await
    }

    /// Evaluate a request as if it arrived at `now`.
    pub async fn evaluate_at(
        &self,
        headers: &HeaderMap,
        remote: SocketAddr,
        now: Instant,
    ) -> AdmissionDecision {
        let identity = self.resolver.resolve(headers, remote);

        let decision = self.user_agents.check(&identity.user_agent);
        if !decision.allow() {
            tracing::debug!(client = %identity.client_id, user_agent = %identity.user_agent, "User agent rejected");
            metrics::record_decision("user_agent", decision.status().as_u16());
            return decision;
        }

        let decision = self.limiter.admit(&identity.client_id, now);
        if !decision.allow() {
            metrics::record_decision("rate_limit", decision.status().as_u16());
            return decision;
        }

        let user_id = headers
            .get(&self.user_id_header)
            .and_then(|v| v.to_str().ok());
        let decision = self.authorizer.authorize(user_id).await;
        match decision.rejection() {
            None => {
                tracing::debug!(client = %identity.client_id, user_id = user_id.unwrap_or_default(), "Request admitted");
                metrics::record_decision("admitted", decision.status().as_u16());
            }
            Some(rejection) if rejection.is_infrastructure() => {
                metrics::record_decision("authorization", decision.status().as_u16());
            }
            Some(rejection) => {
                tracing::debug!(client = %identity.client_id, reason = %rejection, "Authorization rejected");
                metrics::record_decision("authorization", decision.status().as_u16());
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Rejection;
    use crate::auth::MemoryUserStore;
    use axum::http::{header, HeaderValue, StatusCode};
    use std::time::Duration;

    fn pipeline(allowed_agents: &[&str], limit: u32) -> AdmissionPipeline {
        let mut config = GatewayConfig::default();
        config.user_agents.allowed = allowed_agents.iter().map(|s| s.to_string()).collect();
        config.rate_limit.requests = limit;
        config.rate_limit.period_ms = 1000;
        let store = Arc::new(MemoryUserStore::new(["alice"]));
        AdmissionPipeline::from_config(&config, store)
    }

    fn headers(user_agent: &str, user_id: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent).unwrap());
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.7"));
        if let Some(id) = user_id {
            headers.insert("userid", HeaderValue::from_str(id).unwrap());
        }
        headers
    }

    fn remote() -> SocketAddr {
        "10.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_admits_known_user() {
        let pipeline = pipeline(&["MyApp"], 10);
        let decision = pipeline
            .evaluate(&headers("MyApp/1.0", Some("alice")), remote())
            .await;
        assert!(decision.allow());
        assert_eq!(pipeline.limiter().window("198.51.100.7").unwrap().request_count, 1);
        assert!(pipeline.authorizer().contains("alice"));
    }

    #[tokio::test]
    async fn test_user_agent_rejection_has_no_side_effects() {
        let pipeline = pipeline(&["MyApp"], 10);
        let decision = pipeline
            .evaluate(&headers("curl/8.0", Some("alice")), remote())
            .await;

        assert_eq!(decision.status(), StatusCode::FORBIDDEN);
        assert!(pipeline.limiter().is_empty());
        assert!(pipeline.authorizer().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_rejection_skips_authorization() {
        let pipeline = pipeline(&[], 1);
        let t0 = Instant::now();

        let first = pipeline
            .evaluate_at(&headers("any", Some("missing-user")), remote(), t0)
            .await;
        assert_eq!(first, AdmissionDecision::Reject(Rejection::UserNotFound));

        let second = pipeline
            .evaluate_at(&headers("any", Some("alice")), remote(), t0 + Duration::from_millis(10))
            .await;
        assert_eq!(second, AdmissionDecision::Reject(Rejection::RateLimited));
        assert!(!pipeline.authorizer().contains("alice"));
    }

    #[tokio::test]
    async fn test_missing_user_id_counts_against_limit() {
        let pipeline = pipeline(&[], 5);
        let decision = pipeline.evaluate(&headers("any", None), remote()).await;

        assert_eq!(decision.status(), StatusCode::BAD_REQUEST);
        assert_eq!(pipeline.limiter().window("198.51.100.7").unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn test_window_reset_readmits() {
        let pipeline = pipeline(&[], 1);
        let t0 = Instant::now();
        let req = headers("any", Some("alice"));

        assert!(pipeline.evaluate_at(&req, remote(), t0).await.allow());
        assert!(!pipeline.evaluate_at(&req, remote(), t0 + Duration::from_millis(500)).await.allow());
        assert!(pipeline.evaluate_at(&req, remote(), t0 + Duration::from_millis(1001)).await.allow());
    }
}
