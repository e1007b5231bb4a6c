//! Response cache and request idempotency for the lost & found portal.
//!
//! ## Layers
//!
//! ```text
//! handlers ──▶ Cache (read-through, counters, cascades)
//!                 │
//! middleware ──▶ IdempotencyGuard
//!                 │
//!                 ▼
//!            StoreAdapter (namespacing, TTL ceiling, timeouts, fail-open)
//!                 │            │
//!                 │            └── HealthTracker (consecutive-failure circuit)
//!                 ▼
//!            CacheStore: RedisStore | MemoryStore | none (disabled)
//! ```
//!
//! ## Graceful Degradation
//!
//! The cache is an optimization only. With no store configured, with the
//! store unreachable, or with the circuit open, reads are misses and writes
//! and invalidations are skipped. Nothing in this crate returns an error to
//! a request path.

pub mod adapter;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod invalidation;
pub mod metrics;
pub mod namespace;
pub mod store;

use std::sync::Arc;

pub use adapter::StoreAdapter;
pub use cache::{Cache, CacheSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheBackendKind, CacheConfig, IdempotencyConfig, RedisConfig};
pub use error::{CacheError, CacheResult};
pub use health::{HealthState, HealthTracker};
pub use idempotency::{IdempotencyGuard, IdempotencyKey, IdempotencyRecord, Lookup};
pub use invalidation::{CascadeContext, Entity, Mutation};
pub use namespace::KeyNamespacer;
pub use store::{CacheStore, ConnectionState, MemoryStore, RedisStore};

/// Assemble a [`Cache`] over an explicit store (or none).
pub fn build_cache(
    store: Option<Arc<dyn CacheStore>>,
    config: &CacheConfig,
    clock: Arc<dyn Clock>,
) -> CacheResult<Cache> {
    let namespacer = KeyNamespacer::new(&config.app_name, &config.environment)?;
    let health = Arc::new(HealthTracker::new(
        config.failure_threshold,
        config.cooldown(),
        clock,
    ));
    let adapter = StoreAdapter::new(
        store,
        namespacer,
        health,
        config.max_ttl(),
        config.scan_batch_size,
        config.operation_timeout(),
    );
    Ok(Cache::new(adapter, config.default_ttl()))
}

/// Create the cache described by configuration.
///
/// ## Cache Modes
///
/// - **redis** with `redis.url` set: shared store; an unreachable server is
///   bypassed until the connection monitor sees it come back
/// - **redis** without a URL, or **disabled**: every operation is a no-op
/// - **memory**: per-process store
///
/// Only configuration mistakes (bad namespace, unparsable URL) are errors.
pub async fn create_cache(config: &CacheConfig, redis: &RedisConfig) -> CacheResult<Cache> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let store: Option<Arc<dyn CacheStore>> = match config.backend {
        CacheBackendKind::Disabled => {
            tracing::info!("Cache disabled by configuration");
            None
        }
        CacheBackendKind::Memory => {
            tracing::info!("Using in-process memory cache");
            Some(Arc::new(MemoryStore::new(clock.clone())))
        }
        CacheBackendKind::Redis => match redis.url.as_deref().filter(|u| !u.is_empty()) {
            None => {
                tracing::info!("No Redis URL configured, caching disabled");
                None
            }
            Some(url) => Some(Arc::new(RedisStore::connect(redis, url).await?)),
        },
    };

    let cache = build_cache(store, config, clock)?;
    tracing::info!(
        backend = cache.adapter().backend_name(),
        namespace = cache.adapter().namespacer().prefix(),
        max_ttl_secs = config.max_ttl_secs,
        "Cache initialized"
    );
    Ok(cache)
}
