//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the forwarding handler
//! - Wire up middleware (CORS, request ID, tracing, timeout, admission)
//! - Warm the authorization cache and start the sweeper before serving
//! - Forward admitted requests to the upstream

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admission::{admission_middleware, AdmissionPipeline};
use crate::auth::UserStore;
use crate::config::GatewayConfig;
use crate::http::request::{request_id, UuidRequestId};
use crate::lifecycle::{self, Shutdown};
use crate::observability::metrics;
use crate::security::{headers::apply_cors, rate_limit::run_sweeper};

/// Application state injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    /// Upstream base URL without a trailing slash.
    pub upstream_base: Arc<str>,
}

/// HTTP server for the admission proxy.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    pipeline: Arc<AdmissionPipeline>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and user store.
    pub fn new(config: GatewayConfig, store: Arc<dyn UserStore>) -> Self {
        let pipeline = Arc::new(AdmissionPipeline::from_config(&config, store));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState {
            client,
            upstream_base: Arc::from(config.upstream.url.trim_end_matches('/')),
        };

        let router = Self::build_router(&config, state, pipeline.clone());
        Self {
            router,
            config,
            pipeline,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GatewayConfig,
        state: AppState,
        pipeline: Arc<AdmissionPipeline>,
    ) -> Router {
        let router = Router::new()
            .fallback(forward_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(pipeline, admission_middleware));

        let router = router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.upstream.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId));

        // Outermost, so timeout responses are annotated too.
        apply_cors(router, &config.cors)
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &Arc<AdmissionPipeline> {
        &self.pipeline
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Warm the cache, start the sweeper, and serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        // A failed preload is logged inside init; the cache then fills lazily.
        let _ = self.pipeline.authorizer().init().await;

        tokio::spawn(run_sweeper(
            self.pipeline.limiter().clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        ));

        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            rate_limit = self.config.rate_limit.requests,
            period_ms = self.config.rate_limit.period_ms,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(lifecycle::shutdown::wait(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward an admitted request to the upstream, preserving method, path,
/// query, headers and body.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (mut parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers).to_string();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri: Uri = match format!("{}{}", state.upstream_base, path_and_query).parse() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            metrics::record_upstream(502, start_time);
            return (StatusCode::BAD_GATEWAY, "Invalid upstream URI").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %uri,
        "Forwarding request"
    );

    parts.uri = uri;
    // The client derives Host from the upstream URI.
    parts.headers.remove(header::HOST);

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_upstream(response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream(502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
