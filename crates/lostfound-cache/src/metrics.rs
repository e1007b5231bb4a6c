//! Cache metrics emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the host process installs a recorder (the
//! server installs the Prometheus exporter at startup).

use metrics::counter;

pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_STORE_ERRORS_TOTAL: &str = "cache_store_errors_total";
    pub const CACHE_INVALIDATED_KEYS_TOTAL: &str = "cache_invalidated_keys_total";
    pub const IDEMPOTENCY_REPLAYS_TOTAL: &str = "idempotency_replays_total";
}

pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!(names::CACHE_STORE_ERRORS_TOTAL, "op" => op).increment(1);
}

pub fn record_invalidated_keys(count: u64) {
    counter!(names::CACHE_INVALIDATED_KEYS_TOTAL).increment(count);
}

pub fn record_idempotency_replay() {
    counter!(names::IDEMPOTENCY_REPLAYS_TOTAL).increment(1);
}
