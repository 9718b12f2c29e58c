//! Startup helpers.
//!
//! Subsystems initialize in order: config, logging, metrics, store, server.

use std::sync::Arc;

use crate::auth::{JsonFileUserStore, MemoryUserStore, UserStore};
use crate::config::{StoreBackend, StoreConfig};

/// Build the configured user store backend.
pub fn build_store(config: &StoreConfig) -> Arc<dyn UserStore> {
    match (config.backend, &config.path) {
        (StoreBackend::JsonFile, Some(path)) => {
            tracing::info!(path = %path, "Using JSON file user store");
            Arc::new(JsonFileUserStore::new(path))
        }
        (StoreBackend::JsonFile, None) => {
            tracing::warn!("json_file store without a path; falling back to the memory store");
            Arc::new(MemoryUserStore::new(config.users.iter().cloned()))
        }
        (StoreBackend::Memory, _) => {
            tracing::info!(users = config.users.len(), "Using in-memory user store");
            Arc::new(MemoryUserStore::new(config.users.iter().cloned()))
        }
    }
}
