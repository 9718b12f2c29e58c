//! Authorization subsystem.
//!
//! # Data Flow
//! ```text
//! user id header
//!     → cache.rs (verified set, hit = admit)
//!     → store.rs (lookup on miss, found = insert + admit)
//! ```

pub mod cache;
pub mod store;

pub use cache::AuthorizationCache;
pub use store::{JsonFileUserStore, MemoryUserStore, StoreError, UserRecord, UserStore};
