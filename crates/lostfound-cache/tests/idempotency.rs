use std::sync::Arc;
use std::time::Duration;

use lostfound_cache::{
    CacheConfig, IdempotencyGuard, IdempotencyRecord, Lookup, ManualClock, MemoryStore,
    build_cache,
};

fn guard() -> (IdempotencyGuard, Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = CacheConfig {
        environment: "test".into(),
        ..CacheConfig::default()
    };
    let cache = build_cache(Some(store.clone()), &config, clock.clone()).unwrap();
    (IdempotencyGuard::new(cache.adapter().clone(), 256), store, clock)
}

#[tokio::test]
async fn recorded_response_is_replayed_verbatim() {
    let (guard, store, _) = guard();
    let key = guard.parse_key("k1").unwrap();
    assert!(matches!(guard.lookup(&key).await, Lookup::Unseen));

    let body = br#"{"id":"42","title":"Red backpack","status":"lost"}"#;
    let record = IdempotencyRecord::from_json_bytes(201, body).unwrap();
    guard.record(&key, &record, Duration::from_secs(3600)).await;
    assert!(store.ttl("lostfound:test:idempotency:k1").is_some());

    match guard.lookup(&key).await {
        Lookup::Replay(replayed) => {
            assert_eq!(replayed.status_code, 201);
            assert_eq!(replayed.body_bytes(), body);
        }
        Lookup::Unseen => panic!("expected a replay"),
    }
}

#[tokio::test]
async fn records_expire_and_tokens_are_independent() {
    let (guard, _, clock) = guard();
    let k1 = guard.parse_key("k1").unwrap();
    let k2 = guard.parse_key("k2").unwrap();

    let record = IdempotencyRecord::from_json_bytes(200, b"{}").unwrap();
    guard.record(&k1, &record, Duration::from_secs(10)).await;

    assert!(matches!(guard.lookup(&k2).await, Lookup::Unseen));
    assert!(matches!(guard.lookup(&k1).await, Lookup::Replay(_)));

    clock.advance(Duration::from_secs(10));
    assert!(matches!(guard.lookup(&k1).await, Lookup::Unseen));
}

#[tokio::test]
async fn create_ttl_is_bounded_by_cache_ceiling() {
    let (guard, store, _) = guard();
    let key = guard.parse_key("create-1").unwrap();
    let record = IdempotencyRecord::from_json_bytes(201, b"{\"id\":\"1\"}").unwrap();

    guard.record(&key, &record, Duration::from_secs(24 * 3600)).await;
    assert_eq!(
        store.ttl("lostfound:test:idempotency:create-1"),
        Some(Duration::from_secs(3600))
    );
}

#[tokio::test]
async fn store_outage_treats_every_token_as_unseen() {
    let (guard, store, _) = guard();
    let key = guard.parse_key("k1").unwrap();
    let record = IdempotencyRecord::from_json_bytes(201, b"{}").unwrap();
    guard.record(&key, &record, Duration::from_secs(60)).await;

    store.close();
    assert!(matches!(guard.lookup(&key).await, Lookup::Unseen));
    guard.record(&key, &record, Duration::from_secs(60)).await;
}

#[tokio::test]
async fn malformed_tokens_are_ignored() {
    let (guard, _, _) = guard();
    assert!(guard.parse_key("").is_none());
    assert!(guard.parse_key("with space").is_none());
    assert!(guard.parse_key(&"k".repeat(300)).is_none());
}
