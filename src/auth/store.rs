//! Persistent user store abstraction.
//!
//! The admission core only needs to know whether a user id exists, so the
//! store is modelled as an opaque key-existence service.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a user store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the request.
    #[error("user store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with data that could not be decoded.
    #[error("user store returned malformed data: {0}")]
    Malformed(String),
}

/// A user record. Only the identifier matters to admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
}

/// Lookup interface onto the persistent user store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// List every known user id. Used once to warm the cache.
    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Find the record for a single user id.
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
}

/// In-process store, seeded from configuration or by tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashSet<String>>,
}

impl MemoryUserStore {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    /// Register a user after construction.
    pub fn insert(&self, user_id: impl Into<String>) {
        self.users
            .write()
            .expect("user store lock poisoned")
            .insert(user_id.into());
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let users = self.users.read().expect("user store lock poisoned");
        Ok(users.iter().cloned().collect())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().expect("user store lock poisoned");
        Ok(users.get(user_id).map(|id| UserRecord {
            user_id: id.clone(),
        }))
    }
}

/// Store backed by a JSON array of [`UserRecord`]s on disk.
///
/// The file is re-read on every call so users appended by other tooling are
/// visible without a restart.
#[derive(Debug, Clone)]
pub struct JsonFileUserStore {
    path: PathBuf,
}

impl JsonFileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_records(&self) -> Result<Vec<UserRecord>, StoreError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl UserStore for JsonFileUserStore {
    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let records = self.read_records().await?;
        Ok(records.into_iter().map(|r| r.user_id).collect())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let records = self.read_records().await?;
        Ok(records.into_iter().find(|r| r.user_id == user_id))
    }
}
