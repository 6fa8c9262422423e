//! Generic keyed store with read/write exclusion (§4.1).
//!
//! Two interchangeable variants share the [`Cache`] trait: [`InMemoryCache`], a
//! concurrency-safe default backed by a map under a shared-or-exclusive lock,
//! and [`NoopCache`], which never stores anything. `get` may run concurrently
//! with other `get`s; `set`/`delete`/`clear` are mutually exclusive with each
//! other and with `get`. There is no TTL — invalidation is explicit, driven by
//! callers on known write paths (e.g. a failed POST invalidates the listing
//! cache for that schema).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait Cache<T: Clone + Send + Sync>: Send + Sync {
    async fn get(&self, key: &str) -> Option<T>;
    async fn set(&self, key: String, value: T);
    async fn delete(&self, key: &str);
    async fn clear(&self);
}

/// Concurrency-safe default: a map under a single `RwLock`, so reads proceed
/// in parallel and writes are mutually exclusive with everything else.
#[derive(Debug, Default)]
pub struct InMemoryCache<T> {
    inner: RwLock<HashMap<String, T>>,
}

impl<T> InMemoryCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Cache<T> for InMemoryCache<T> {
    async fn get(&self, key: &str) -> Option<T> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: String, value: T) {
        self.inner.write().await.insert(key, value);
    }

    async fn delete(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// Swap-in variant that never stores anything; used when a caller wants to
/// force re-enumeration on every call (e.g. some dry-run configurations).
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl<T: Clone + Send + Sync> Cache<T> for NoopCache {
    async fn get(&self, _key: &str) -> Option<T> {
        None
    }

    async fn set(&self, _key: String, _value: T) {}

    async fn delete(&self, _key: &str) {}

    async fn clear(&self) {}
}
