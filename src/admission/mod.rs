//! Admission control.
//!
//! # Data Flow
//! ```text
//! request
//!     → middleware.rs (extract headers + remote address)
//!     → pipeline.rs (user agent → rate limit → authorization)
//!     → decision.rs (Admit, or Reject with status + message)
//! ```

pub mod decision;
pub mod middleware;
pub mod pipeline;

pub use decision::{AdmissionDecision, Rejection};
pub use middleware::admission_middleware;
pub use pipeline::AdmissionPipeline;
