//! Admission decisions and the rejection taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::store::StoreError;

/// Why a request was turned away.
///
/// Every variant except [`Rejection::Store`] is a client error and is safe to
/// return verbatim. `Store` is an infrastructure fault in the user store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The user agent matched none of the allowed substrings.
    #[error("User Agent not matching")]
    UserAgentNotAllowed,

    /// The client exhausted its window.
    #[error("Too many requests, please try again later.")]
    RateLimited,

    /// The user id header was absent or empty.
    #[error("No user ID provided.")]
    MissingUserId,

    /// The user store has no record for the presented id.
    #[error("User not found.")]
    UserNotFound,

    /// The user store failed while resolving a cache miss.
    #[error("User store unavailable.")]
    Store(#[from] StoreError),
}

impl Rejection {
    /// HTTP status the caller should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingUserId => StatusCode::BAD_REQUEST,
            Rejection::UserAgentNotAllowed => StatusCode::FORBIDDEN,
            Rejection::UserNotFound => StatusCode::NOT_FOUND,
            Rejection::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Rejection::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// True when the rejection reflects a dependency fault rather than
    /// client misbehavior.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Rejection::Store(_))
    }
}

/// The verdict for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Reject(Rejection),
}

impl AdmissionDecision {
    pub fn allow(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionDecision::Admit => StatusCode::OK,
            AdmissionDecision::Reject(rejection) => rejection.status(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AdmissionDecision::Admit => "OK".to_string(),
            AdmissionDecision::Reject(rejection) => rejection.to_string(),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            AdmissionDecision::Admit => None,
            AdmissionDecision::Reject(rejection) => Some(rejection),
        }
    }
}

impl From<Rejection> for AdmissionDecision {
    fn from(rejection: Rejection) -> Self {
        AdmissionDecision::Reject(rejection)
    }
}

/// JSON body sent back with every rejection.
#[derive(Debug, Serialize)]
struct RejectionBody {
    status: bool,
    message: String,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            status: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
