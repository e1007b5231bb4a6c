//! Integration tests against a real Redis.
//!
//! Tests use testcontainers to spin up a Redis instance and are ignored by
//! default; run them with `cargo test -- --ignored` on a host with Docker.

use std::time::Duration;

use lostfound_cache::{
    CacheBackendKind, CacheConfig, CascadeContext, ConnectionState, Entity, IdempotencyGuard,
    IdempotencyRecord, Lookup, Mutation, RedisConfig, create_cache,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

/// Each test gets its own environment tag so namespaces never overlap.
fn cache_config() -> CacheConfig {
    CacheConfig {
        backend: CacheBackendKind::Redis,
        environment: format!("t{}", uuid::Uuid::new_v4().simple()),
        scan_batch_size: 5,
        ..CacheConfig::default()
    }
}

async fn redis_config() -> RedisConfig {
    RedisConfig {
        url: Some(get_redis_url().await),
        ..RedisConfig::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_set_get_roundtrip() {
    let cache = create_cache(&cache_config(), &redis_config().await)
        .await
        .unwrap();
    assert!(cache.is_ready());
    assert_eq!(cache.adapter().connection_state(), ConnectionState::Connected);

    cache
        .set("item:1", &serde_json::json!({"title": "keys"}), Duration::from_secs(60))
        .await;
    let value: Option<serde_json::Value> = cache.get("item:1").await;
    assert_eq!(value, Some(serde_json::json!({"title": "keys"})));

    let snapshot = cache.snapshot();
    assert_eq!(snapshot.backend, "redis");
    assert_eq!(snapshot.hits, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_pattern_invalidation_across_scan_batches() {
    let cache = create_cache(&cache_config(), &redis_config().await)
        .await
        .unwrap();
    let ttl = Duration::from_secs(60);
    for page in 1..=23 {
        cache.set(&format!("items:list:page={page}"), &page, ttl).await;
    }
    cache.set("item:42", &"detail", ttl).await;
    cache.set("item:43", &"other", ttl).await;

    let deleted = cache
        .cascade(Entity::Item, Mutation::Update, &CascadeContext::for_id("42"))
        .await;
    assert_eq!(deleted, 24);
    assert_eq!(cache.get::<u32>("items:list:page=7").await, None);
    assert_eq!(cache.get::<String>("item:43").await.as_deref(), Some("other"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_idempotency_record_replay() {
    let cache = create_cache(&cache_config(), &redis_config().await)
        .await
        .unwrap();
    let guard = IdempotencyGuard::new(cache.adapter().clone(), 256);
    let key = guard.parse_key("redis-k1").unwrap();

    let body = br#"{"id":"1","status":"found"}"#;
    let record = IdempotencyRecord::from_json_bytes(201, body).unwrap();
    guard.record(&key, &record, Duration::from_secs(60)).await;

    match guard.lookup(&key).await {
        Lookup::Replay(r) => {
            assert_eq!(r.status_code, 201);
            assert_eq!(r.body_bytes(), body);
        }
        Lookup::Unseen => panic!("expected replay"),
    }
}

#[tokio::test]
async fn test_unreachable_redis_fails_open() {
    let redis = RedisConfig {
        url: Some("redis://127.0.0.1:1".into()),
        timeout_ms: 200,
        ..RedisConfig::default()
    };
    let cache = create_cache(&cache_config(), &redis).await.unwrap();

    assert!(!cache.is_ready());
    cache.set("item:1", &1, Duration::from_secs(60)).await;
    assert_eq!(cache.get::<i32>("item:1").await, None);
    assert_eq!(cache.invalidate("items:list:*").await, 0);
}

#[tokio::test]
async fn test_missing_url_disables_cache() {
    let cache = create_cache(&cache_config(), &RedisConfig::default())
        .await
        .unwrap();
    assert_eq!(cache.adapter().backend_name(), "disabled");
    assert!(!cache.is_ready());
}
