//! Write-through cache of verified user ids.

use std::sync::Arc;

use dashmap::DashSet;

use crate::admission::{AdmissionDecision, Rejection};
use crate::auth::store::{StoreError, UserStore};
use crate::observability::metrics;

/// Verified user set in front of a [`UserStore`].
///
/// Membership only ever grows: an id in the set existed in the store at some
/// point. The set lock is never held across a store call, so two concurrent
/// misses for the same new user may both reach the store.
pub struct AuthorizationCache {
    verified: DashSet<String>,
    store: Arc<dyn UserStore>,
}

impl AuthorizationCache {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            verified: DashSet::new(),
            store,
        }
    }

    /// Bulk-load every user id from the store.
    ///
    /// A failure is logged and returned; the cache stays usable and fills
    /// lazily from misses.
    pub async fn init(&self) -> Result<usize, StoreError> {
        match self.store.list_user_ids().await {
            Ok(ids) => {
                for id in ids {
                    self.verified.insert(id);
                }
                metrics::record_verified_users(self.verified.len());
                tracing::info!(users = self.verified.len(), "Users fetched into memory");
                Ok(self.verified.len())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to preload users; starting with a cold cache");
                Err(e)
            }
        }
    }

    /// Decide whether `user_id` belongs to a known user.
    pub async fn authorize(&self, user_id: Option<&str>) -> AdmissionDecision {
        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return Rejection::MissingUserId.into(),
        };

        if self.verified.contains(user_id) {
            tracing::debug!(user_id, "User authorized from cache");
            return AdmissionDecision::Admit;
        }

        match self.store.find_user(user_id).await {
            Ok(Some(_)) => {
                metrics::record_store_lookup("found");
                self.verified.insert(user_id.to_string());
                metrics::record_verified_users(self.verified.len());
                tracing::debug!(user_id, "User authorized from store");
                AdmissionDecision::Admit
            }
            Ok(None) => {
                metrics::record_store_lookup("not_found");
                Rejection::UserNotFound.into()
            }
            Err(e) => {
                metrics::record_store_lookup("error");
                tracing::error!(user_id, error = %e, "User store lookup failed");
                Rejection::Store(e).into()
            }
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.verified.contains(user_id)
    }

    /// Number of verified users held in memory.
    pub fn len(&self) -> usize {
        self.verified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{MemoryUserStore, UserRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a store and counts lookups.
    struct CountingStore {
        inner: MemoryUserStore,
        finds: AtomicUsize,
        fail: bool,
    }

    impl CountingStore {
        fn new(users: &[&str]) -> Self {
            Self {
                inner: MemoryUserStore::new(users.iter().copied()),
                finds: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }

        fn finds(&self) -> usize {
            self.finds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.inner.list_user_ids().await
        }

        async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoreError::Unavailable("down".into()));
            }
            self.inner.find_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_missing_user_id() {
        let store = Arc::new(CountingStore::new(&["alice"]));
        let cache = AuthorizationCache::new(store.clone());

        assert_eq!(
            cache.authorize(None).await,
            AdmissionDecision::Reject(Rejection::MissingUserId)
        );
        assert_eq!(
            cache.authorize(Some("")).await,
            AdmissionDecision::Reject(Rejection::MissingUserId)
        );
        assert_eq!(store.finds(), 0);
    }

    #[tokio::test]
    async fn test_only_first_miss_touches_store() {
        let store = Arc::new(CountingStore::new(&["alice"]));
        let cache = AuthorizationCache::new(store.clone());

        for _ in 0..5 {
            assert!(cache.authorize(Some("alice")).await.allow());
        }
        assert_eq!(store.finds(), 1);
        assert!(cache.contains("alice"));
    }

    #[tokio::test]
    async fn test_unknown_user_not_cached() {
        let store = Arc::new(CountingStore::new(&["alice"]));
        let cache = AuthorizationCache::new(store.clone());

        assert_eq!(
            cache.authorize(Some("mallory")).await,
            AdmissionDecision::Reject(Rejection::UserNotFound)
        );
        assert!(!cache.contains("mallory"));

        // Each attempt goes back to the store
        cache.authorize(Some("mallory")).await;
        assert_eq!(store.finds(), 2);
    }

    #[tokio::test]
    async fn test_user_added_to_store_later() {
        let store = Arc::new(MemoryUserStore::new(Vec::<String>::new()));
        let cache = AuthorizationCache::new(store.clone());

        assert!(!cache.authorize(Some("late")).await.allow());
        store.insert("late");
        assert!(cache.authorize(Some("late")).await.allow());
    }

    #[tokio::test]
    async fn test_init_preloads_users() {
        let store = Arc::new(CountingStore::new(&["alice", "bob"]));
        let cache = AuthorizationCache::new(store.clone());

        assert_eq!(cache.init().await, Ok(2));
        assert!(cache.authorize(Some("bob")).await.allow());
        assert_eq!(store.finds(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_rejects_without_caching() {
        let store = Arc::new(CountingStore::failing());
        let cache = AuthorizationCache::new(store.clone());

        assert!(cache.init().await.is_err());
        assert!(cache.is_empty());

        let decision = cache.authorize(Some("alice")).await;
        let rejection = decision.rejection().cloned().unwrap();
        assert!(rejection.is_infrastructure());
        assert!(cache.is_empty());
    }

    /// A store whose lookups only complete once `parties` of them are in flight.
    struct GatedStore {
        barrier: tokio::sync::Barrier,
        finds: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for GatedStore {
        async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            Ok(Some(UserRecord {
                user_id: user_id.to_string(),
            }))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_store_lookups_run_in_parallel() {
        const PARTIES: usize = 8;
        let store = Arc::new(GatedStore {
            barrier: tokio::sync::Barrier::new(PARTIES),
            finds: AtomicUsize::new(0),
        });
        let cache = Arc::new(AuthorizationCache::new(store.clone()));

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.authorize(Some("erin")).await })
            })
            .collect();

        // Every lookup must be in flight at once for the barrier to release
        let decisions = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let mut decisions = Vec::new();
            for handle in handles {
                decisions.push(handle.await.unwrap());
            }
            decisions
        })
        .await
        .expect("store lookups were serialized");

        assert!(decisions.iter().all(AdmissionDecision::allow));
        assert_eq!(store.finds.load(Ordering::SeqCst), PARTIES);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_insert_once() {
        let store = Arc::new(CountingStore::new(&["carol"]));
        let cache = Arc::new(AuthorizationCache::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.authorize(Some("carol")).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().allow());
        }

        assert_eq!(cache.len(), 1);
        assert!(store.finds() >= 1);
    }
}
