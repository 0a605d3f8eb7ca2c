//! Integration tests against a real Redis instance.
//!
//! Prerequisites:
//! - Redis running locally or via Docker
//! - Environment variable: REDIS_URL (default redis://localhost:6379)
//!
//! ```bash
//! docker run --name redis-test -p 6379:6379 -d redis:7
//! cargo test --package cache-layer --test integration_test -- --nocapture
//! ```

use cache_layer::{CacheAside, CacheError, CacheStore, StaleShadow, StampedeLock, TtlPolicy, WriteThroughProfile};
use redis::aio::ConnectionManager;
use resilience::{CircuitBreaker, CircuitBreakerConfig};
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn connection_manager() -> ConnectionManager {
    let client = redis::Client::open(redis_url()).expect("valid REDIS_URL");
    ConnectionManager::new(client).await.expect("failed to connect to Redis")
}

fn unique_key(label: &str) -> String {
    format!("cache-layer-test:{}:{}", label, uuid::Uuid::new_v4())
}

async fn stampede_lock(label: &str) -> StampedeLock {
    StampedeLock::new(connection_manager().await).with_key_prefix(label)
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn cache_aside_populates_on_miss_and_serves_from_cache_on_hit() {
    let store = CacheStore::new(connection_manager().await);
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("cache", Duration::from_secs(15))));
    let aside = CacheAside::new(store, breaker, TtlPolicy::search(), stampede_lock("search").await);

    let key = unique_key("search");
    let loads = Arc::new(AtomicU32::new(0));

    let load = || {
        let loads = loads.clone();
        async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CacheError>(vec!["result-a".to_string(), "result-b".to_string()])
        }
    };

    let first = aside.get_or_load(&key, load.clone()).await.unwrap();
    let second = aside.get_or_load(&key, load).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(loads.load(Ordering::SeqCst), 1, "second read should come from cache, not the loader");
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn invalidate_all_clears_every_key_under_the_prefix() {
    let store = CacheStore::new(connection_manager().await);
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("cache", Duration::from_secs(15))));
    let aside = CacheAside::new(store.clone(), breaker, TtlPolicy::search(), stampede_lock("search").await);

    let prefix = unique_key("search-prefix");
    let key_a = format!("{prefix}:a");
    let key_b = format!("{prefix}:b");

    store.set(&key_a, &"value-a", Duration::from_secs(60)).await.unwrap();
    store.set(&key_b, &"value-b", Duration::from_secs(60)).await.unwrap();

    aside.invalidate_all(&prefix).await;

    assert_eq!(store.get::<String>(&key_a).await.unwrap(), None);
    assert_eq!(store.get::<String>(&key_b).await.unwrap(), None);
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn write_through_falls_back_to_the_stale_shadow_when_the_primary_fails() {
    let store = CacheStore::new(connection_manager().await);
    let profile = WriteThroughProfile::new(store);

    let key = unique_key("profile");
    profile.write(&key, &"last known good profile".to_string()).await;

    // Force a primary-store miss so the cache entry is the only path left,
    // then evict it to exercise the stale-shadow path specifically.
    let stale_only = CacheStore::new(connection_manager().await);
    stale_only.del(&key).await.unwrap();

    let result = profile
        .read(&key, || async { Err::<String, _>(CacheError::Unavailable("primary store down".into())) })
        .await
        .unwrap();

    assert_eq!(result, "last known good profile");
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn write_through_propagates_unavailable_when_no_stale_copy_exists() {
    let store = CacheStore::new(connection_manager().await);
    let profile = WriteThroughProfile::new(store);

    let key = unique_key("profile-no-stale");

    let result = profile
        .read(&key, || async { Err::<String, _>(CacheError::Unavailable("primary store down".into())) })
        .await;

    assert!(matches!(result, Err(CacheError::Unavailable(_))));
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn stampede_lock_admits_exactly_one_winner() {
    let redis = connection_manager().await;
    let lock = StampedeLock::new(redis);
    let key = unique_key("hot-key");

    let first = lock.try_lock(&key).await.unwrap();
    let second = lock.try_lock(&key).await.unwrap();

    assert!(first, "first caller should win the lock");
    assert!(!second, "second caller should be rejected while the lock is held");

    lock.unlock(&key).await.unwrap();
    let third = lock.try_lock(&key).await.unwrap();
    assert!(third, "lock should be re-acquirable after unlock");
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn concurrent_misses_on_the_same_key_rebuild_exactly_once() {
    let store = CacheStore::new(connection_manager().await);
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("cache", Duration::from_secs(15))));
    let aside = Arc::new(CacheAside::new(store, breaker, TtlPolicy::search(), stampede_lock("stampede").await));

    let key = unique_key("hot");
    let loads = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let aside = aside.clone();
        let key = key.clone();
        let loads = loads.clone();
        handles.push(tokio::spawn(async move {
            aside
                .get_or_load(&key, || {
                    let loads = loads.clone();
                    async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, CacheError>("rebuilt value".to_string())
                    }
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "rebuilt value");
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1, "only the stampede lock winner should rebuild");
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn stale_shadow_roundtrips_independently_of_the_primary_cache_entry() {
    let store = CacheStore::new(connection_manager().await);
    let shadow = StaleShadow::new(store.clone());
    let key = unique_key("shadow");

    shadow.set(&key, &"shadow copy".to_string()).await;
    store.del(&key).await.unwrap(); // primary entry never existed in this test

    let value: Option<String> = shadow.get(&key).await.unwrap();
    assert_eq!(value, Some("shadow copy".to_string()));
}
