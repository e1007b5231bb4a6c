//! Read-through cache API used by request handlers.
//!
//! ## Handler Contract
//!
//! ```text
//! GET  → cache.get(key) ── hit ──▶ respond with cached payload
//!                  └─ miss ─▶ compute from source of truth → cache.set(key) → respond
//! POST/PATCH/DELETE → write source of truth → cache.cascade(entity, mutation, ctx)
//! ```
//!
//! Cached values are the exact payloads a handler would otherwise build, so a
//! hit is indistinguishable from a live computation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::adapter::StoreAdapter;
use crate::health::HealthState;
use crate::invalidation::{self, CascadeContext, Entity, Mutation};
use crate::metrics;
use crate::store::ConnectionState;

/// Process-wide hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit();
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Point-in-time view for health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub consecutive_failures: u32,
    pub store_ready: bool,
    pub backend: &'static str,
    pub health: HealthState,
    pub connection: ConnectionState,
}

#[derive(Clone, Debug)]
pub struct Cache {
    adapter: StoreAdapter,
    counters: Arc<CacheCounters>,
    default_ttl: Duration,
}

impl Cache {
    pub fn new(adapter: StoreAdapter, default_ttl: Duration) -> Self {
        Self {
            adapter,
            counters: Arc::new(CacheCounters::default()),
            default_ttl,
        }
    }

    pub fn adapter(&self) -> &StoreAdapter {
        &self.adapter
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    /// Look a key up, counting the outcome.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.adapter.get::<T>(key).await {
            Some(value) => {
                self.counters.hit();
                tracing::debug!(key = %key, "cache hit");
                Some(value)
            }
            None => {
                self.counters.miss();
                tracing::debug!(key = %key, "cache miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        self.adapter.set(key, value, ttl).await;
    }

    /// Get, or compute from the source of truth and populate on miss.
    ///
    /// Errors from `compute` pass through unchanged; nothing is cached for them.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }
        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Delete every entry matching `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        self.adapter.delete_by_pattern(pattern).await
    }

    pub async fn invalidate_all<S: AsRef<str>>(&self, patterns: &[S]) -> u64 {
        let mut total = 0;
        for pattern in patterns {
            total += self.invalidate(pattern.as_ref()).await;
        }
        total
    }

    /// Run the cascade registered for `(entity, mutation)`.
    pub async fn cascade(&self, entity: Entity, mutation: Mutation, ctx: &CascadeContext) -> u64 {
        let patterns = invalidation::patterns(entity, mutation, ctx);
        let deleted = self.invalidate_all(&patterns).await;
        tracing::debug!(
            entity = ?entity,
            mutation = ?mutation,
            patterns = ?patterns,
            deleted,
            "cache cascade"
        );
        deleted
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let health = self.adapter.health();
        CacheSnapshot {
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            consecutive_failures: health.consecutive_failures(),
            store_ready: self.adapter.is_ready(),
            backend: self.adapter.backend_name(),
            health: health.state(),
            connection: self.adapter.connection_state(),
        }
    }
}
