use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Shared Redis store (requires `redis.url`; caching is disabled without it)
    Redis,
    /// Single-instance in-process store
    Memory,
    /// Every operation is a no-op
    Disabled,
}

impl std::fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendKind::Redis => write!(f, "redis"),
            CacheBackendKind::Memory => write!(f, "memory"),
            CacheBackendKind::Disabled => write!(f, "disabled"),
        }
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379").
    /// When absent, caching runs in disabled mode.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Cache layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: CacheBackendKind,

    /// First namespace segment
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Deployment environment tag ("development", "staging", "prod", ...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// TTL used by handlers that do not ask for a specific one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Ceiling applied to every write, whatever TTL the caller requests
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,

    /// Consecutive failures before the store is treated as degraded
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long a degraded store is bypassed before it is probed again
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Keys requested per SCAN round-trip during pattern invalidation
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,

    /// Upper bound on any single store operation
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_backend() -> CacheBackendKind {
    CacheBackendKind::Redis
}

fn default_app_name() -> String {
    "lostfound".into()
}

fn default_environment() -> String {
    "development".into()
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_max_ttl_secs() -> u64 {
    3600
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_scan_batch_size() -> usize {
    100
}

fn default_operation_timeout_ms() -> u64 {
    2000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            app_name: default_app_name(),
            environment: default_environment(),
            default_ttl_secs: default_ttl_secs(),
            max_ttl_secs: default_max_ttl_secs(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            scan_batch_size: default_scan_batch_size(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ttl_secs == 0 {
            return Err("cache.max_ttl_secs must be > 0".into());
        }
        if self.default_ttl_secs == 0 || self.default_ttl_secs > self.max_ttl_secs {
            return Err("cache.default_ttl_secs must be in 1..=cache.max_ttl_secs".into());
        }
        if self.failure_threshold == 0 {
            return Err("cache.failure_threshold must be > 0".into());
        }
        if self.scan_batch_size == 0 {
            return Err("cache.scan_batch_size must be > 0".into());
        }
        if self.operation_timeout_ms == 0 {
            return Err("cache.operation_timeout_ms must be > 0".into());
        }
        crate::namespace::KeyNamespacer::new(&self.app_name, &self.environment)
            .map_err(|e| format!("cache namespace: {e}"))?;
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Idempotency guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// TTL for records of create operations
    #[serde(default = "default_create_ttl_secs")]
    pub create_ttl_secs: u64,

    /// TTL for records of every other mutation
    #[serde(default = "default_idempotency_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Longest accepted `Idempotency-Key` value
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,

    /// Largest response body that will be captured for replay
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_create_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_idempotency_ttl_secs() -> u64 {
    60 * 60
}

fn default_max_key_length() -> usize {
    256
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            create_ttl_secs: default_create_ttl_secs(),
            default_ttl_secs: default_idempotency_ttl_secs(),
            max_key_length: default_max_key_length(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl IdempotencyConfig {
    pub fn create_ttl(&self) -> Duration {
        Duration::from_secs(self.create_ttl_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}
