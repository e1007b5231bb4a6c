use thiserror::Error;

/// Errors raised inside the cache layer.
///
/// None of these reach an HTTP response: the adapter converts every store
/// failure into a miss or a skipped write. They exist so failures can be
/// logged with a cause and counted by the health tracker.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Cache store operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Cache store is closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid namespace segment '{0}': only [A-Za-z0-9_-] are allowed")]
    InvalidNamespace(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Whether the error indicates the connection itself is gone, as opposed
    /// to a single failed command.
    pub fn is_connection_error(&self) -> bool {
        match self {
            CacheError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            CacheError::Pool(_) | CacheError::Closed => true,
            _ => false,
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        CacheError::Pool(e.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
