//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CORS annotation on the way out)
//!     → identity.rs (client id from trusted headers or socket)
//!     → user_agent.rs (allow-list check)
//!     → rate_limit.rs (per-client fixed window)
//!     → Pass to authorization
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - Forwarding headers are trusted only in the configured order

pub mod headers;
pub mod identity;
pub mod rate_limit;
pub mod user_agent;

pub use identity::{ClientIdentity, IdentityResolver};
pub use rate_limit::{ClientWindow, RateLimiter};
pub use user_agent::UserAgentFilter;
