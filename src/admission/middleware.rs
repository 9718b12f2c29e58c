//! Axum middleware running the admission pipeline.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admission::{AdmissionDecision, AdmissionPipeline};

/// Reject the request with the pipeline's decision, or pass it on.
pub async fn admission_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Without ConnectInfo (e.g. router tests) fall back to the unspecified address.
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0)
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    let (parts, body) = request.into_parts();
    match pipeline.evaluate(&parts.headers, remote).await {
        AdmissionDecision::Admit => next.run(Request::from_parts(parts, body)).await,
        AdmissionDecision::Reject(rejection) => rejection.into_response(),
    }
}
