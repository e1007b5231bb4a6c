//! Fail-open wrapper around a [`CacheStore`].
//!
//! Every operation:
//! 1. short-circuits to miss / no-op unless [`StoreAdapter::is_ready`],
//! 2. namespaces its key,
//! 3. runs under the operation timeout,
//! 4. reports the outcome to the [`HealthTracker`].
//!
//! Errors are logged here and never returned.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, CacheResult};
use crate::health::HealthTracker;
use crate::metrics;
use crate::namespace::KeyNamespacer;
use crate::store::{CacheStore, ConnectionState};

#[derive(Clone)]
pub struct StoreAdapter {
    store: Option<Arc<dyn CacheStore>>,
    namespacer: KeyNamespacer,
    health: Arc<HealthTracker>,
    max_ttl: Duration,
    scan_batch_size: usize,
    operation_timeout: Duration,
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("backend", &self.backend_name())
            .field("namespace", &self.namespacer.prefix())
            .field("max_ttl", &self.max_ttl)
            .finish()
    }
}

impl StoreAdapter {
    pub fn new(
        store: Option<Arc<dyn CacheStore>>,
        namespacer: KeyNamespacer,
        health: Arc<HealthTracker>,
        max_ttl: Duration,
        scan_batch_size: usize,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            namespacer,
            health,
            max_ttl,
            scan_batch_size: scan_batch_size.max(1),
            operation_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.as_ref().map(|s| s.name()).unwrap_or("disabled")
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// Requested TTL clamped into `1s..=max_ttl`.
    pub fn effective_ttl(&self, requested: Duration) -> Duration {
        requested.min(self.max_ttl).max(Duration::from_secs(1))
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.store
            .as_ref()
            .map(|s| s.connection_state())
            .unwrap_or(ConnectionState::Closed)
    }

    /// Whether the store may be touched right now.
    pub fn is_ready(&self) -> bool {
        self.ready_store().is_some()
    }

    fn ready_store(&self) -> Option<&Arc<dyn CacheStore>> {
        let store = self.store.as_ref()?;
        if store.connection_state() != ConnectionState::Connected {
            return None;
        }
        if !self.health.allows_attempt() {
            return None;
        }
        Some(store)
    }

    async fn run<T, F>(&self, op: &'static str, key: &str, fut: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let outcome = match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.operation_timeout.as_millis() as u64)),
        };
        match outcome {
            Ok(value) => {
                self.health.record_success();
                Some(value)
            }
            Err(e) => {
                self.health.record_failure();
                metrics::record_store_error(op);
                tracing::warn!(
                    op,
                    key = %key,
                    error = %e,
                    consecutive_failures = self.health.consecutive_failures(),
                    "cache store operation failed"
                );
                None
            }
        }
    }

    /// Fetch raw bytes for a raw (un-namespaced) key.
    pub async fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let store = self.ready_store()?;
        let full_key = self.namespacer.namespace(key);
        self.run("get", &full_key, store.get(&full_key)).await.flatten()
    }

    /// Fetch and decode a value. Undecodable payloads are deleted and read as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.get_bytes(key).await?;
        match serde_json::from_slice::<T>(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to deserialize cached value, evicting");
                self.delete_key(key).await;
                None
            }
        }
    }

    /// Store raw bytes under the TTL ceiling.
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let Some(store) = self.ready_store() else {
            return;
        };
        let full_key = self.namespacer.namespace(key);
        let ttl = self.effective_ttl(ttl);
        if self
            .run("set", &full_key, store.set_ex(&full_key, value, ttl))
            .await
            .is_some()
        {
            tracing::debug!(key = %full_key, ttl_secs = ttl.as_secs(), "cache set");
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        if !self.is_ready() {
            return;
        }
        match serde_json::to_vec(value) {
            Ok(data) => self.set_bytes(key, data, ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize value for cache");
            }
        }
    }

    /// Delete a single exact key.
    pub async fn delete_key(&self, key: &str) -> u64 {
        let Some(store) = self.ready_store() else {
            return 0;
        };
        let full_key = self.namespacer.namespace(key);
        let keys = [full_key];
        self.run("delete", &keys[0], store.delete(&keys))
            .await
            .unwrap_or(0)
    }

    /// Delete every key matching a glob pattern.
    ///
    /// Scans in cursor-driven rounds of `scan_batch_size`, collecting the
    /// matching keys, then removes them in batched round-trips of the same
    /// size. A failure at any point stops the sweep; what was already removed
    /// stays removed.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        let Some(store) = self.ready_store() else {
            tracing::debug!(pattern = %pattern, "cache not ready, skipping invalidation");
            return 0;
        };
        let full_pattern = self.namespacer.namespace(pattern);

        let mut matched: BTreeSet<String> = BTreeSet::new();
        let mut cursor = 0u64;
        loop {
            let Some((next, keys)) = self
                .run(
                    "scan",
                    &full_pattern,
                    store.scan(cursor, &full_pattern, self.scan_batch_size),
                )
                .await
            else {
                return 0;
            };
            matched.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if matched.is_empty() {
            return 0;
        }

        let keys: Vec<String> = matched.into_iter().collect();
        let mut deleted = 0;
        for chunk in keys.chunks(self.scan_batch_size) {
            match self.run("delete", &full_pattern, store.delete(chunk)).await {
                Some(n) => deleted += n,
                None => break,
            }
        }

        metrics::record_invalidated_keys(deleted);
        tracing::debug!(pattern = %full_pattern, matched = keys.len(), deleted, "cache pattern invalidated");
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn adapter(max_ttl: Duration) -> (StoreAdapter, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let health = Arc::new(HealthTracker::new(5, Duration::from_secs(60), clock));
        let adapter = StoreAdapter::new(
            Some(store.clone()),
            KeyNamespacer::new("lostfound", "test").unwrap(),
            health,
            max_ttl,
            3,
            Duration::from_secs(1),
        );
        (adapter, store)
    }

    #[tokio::test]
    async fn keys_are_namespaced_in_the_store() {
        let (adapter, store) = adapter(Duration::from_secs(3600));
        adapter.set("item:1", &42u32, Duration::from_secs(10)).await;
        assert!(store.get("lostfound:test:item:1").await.unwrap().is_some());
        assert!(store.get("item:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ttl_is_clamped_to_ceiling() {
        let (adapter, store) = adapter(Duration::from_secs(3600));
        adapter
            .set("long", &"v", Duration::from_secs(86_400))
            .await;
        assert_eq!(
            store.ttl("lostfound:test:long"),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(adapter.effective_ttl(Duration::ZERO), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn corrupt_payload_is_evicted() {
        let (adapter, store) = adapter(Duration::from_secs(3600));
        store
            .set_ex("lostfound:test:bad", b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<serde_json::Value> = adapter.get("bad").await;
        assert!(value.is_none());
        assert!(store.get("lostfound:test:bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pattern_delete_spans_many_batches() {
        let (adapter, store) = adapter(Duration::from_secs(3600));
        for i in 0..10 {
            adapter
                .set(&format!("items:list:p{i}"), &i, Duration::from_secs(60))
                .await;
        }
        adapter.set("item:1", &1, Duration::from_secs(60)).await;

        let deleted = adapter.delete_by_pattern("items:list:*").await;
        assert_eq!(deleted, 10);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn disabled_adapter_is_inert() {
        let clock = Arc::new(ManualClock::new());
        let adapter = StoreAdapter::new(
            None,
            KeyNamespacer::new("lostfound", "test").unwrap(),
            Arc::new(HealthTracker::new(5, Duration::from_secs(60), clock)),
            Duration::from_secs(3600),
            100,
            Duration::from_secs(1),
        );
        assert!(!adapter.is_ready());
        assert_eq!(adapter.backend_name(), "disabled");
        adapter.set("k", &1, Duration::from_secs(5)).await;
        assert_eq!(adapter.get::<i32>("k").await, None);
        assert_eq!(adapter.delete_by_pattern("*").await, 0);
    }
}
