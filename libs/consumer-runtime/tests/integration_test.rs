//! Integration tests against a real Redis instance.
//!
//! Prerequisites:
//! - Redis running locally or via Docker
//! - Environment variable: REDIS_URL (default redis://localhost:6379)
//!
//! ```bash
//! docker run --name redis-test -p 6379:6379 -d redis:7
//! cargo test --package consumer-runtime --test integration_test -- --nocapture
//! ```

use async_trait::async_trait;
use consumer_runtime::{ConsumerHandler, ConsumerRuntime, ConsumerRuntimeConfig};
use error_handling::CoreError;
use event_bus::{EventHandler, InMemoryEventBus, InboundRecord};
use idempotency_store::IdempotencyStore;
use redis::aio::ConnectionManager;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn idempotency_store() -> IdempotencyStore {
    let client = redis::Client::open(redis_url()).expect("valid REDIS_URL");
    let manager = ConnectionManager::new(client).await.expect("failed to connect to Redis");
    IdempotencyStore::new(manager).with_key_prefix("consumer-runtime-test")
}

struct FlakyHandler {
    calls: AtomicU32,
    fail_times: u32,
    aggregate_id: String,
}

impl FlakyHandler {
    fn new(fail_times: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_times,
            aggregate_id: format!("integration-{}", uuid::Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl ConsumerHandler for FlakyHandler {
    async fn handle(&self, _payload: &[u8]) -> Result<(), CoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            Err(CoreError::Transient("downstream unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn business_identity(&self, _payload: &[u8]) -> Option<(String, String)> {
        Some(("APPLICATION_CREATED".into(), self.aggregate_id.clone()))
    }

    fn retry_partition_key(&self, _payload: &[u8]) -> String {
        "user-7".into()
    }
}

fn record() -> InboundRecord {
    InboundRecord {
        topic: "application.created".into(),
        partition: 0,
        offset: 1,
        key: "42".into(),
        payload: serde_json::to_vec(&serde_json::json!({"applicationId": 1})).unwrap(),
    }
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn successful_handler_does_not_touch_the_retry_topic() {
    let handler = Arc::new(FlakyHandler::new(0));
    let bus = Arc::new(InMemoryEventBus::new(4));
    let retry_calls = Arc::new(AtomicU32::new(0));
    bus.subscribe(
        "notification.retry",
        "retry-consumer",
        Arc::new(CountingRetrySubscriber { calls: retry_calls.clone() }),
    )
    .await
    .unwrap();

    let config = ConsumerRuntimeConfig::new("email", "notification.retry", 4);
    let runtime = ConsumerRuntime::new(handler, bus, idempotency_store().await, config);

    runtime.handle(record()).await.unwrap();
    assert_eq!(retry_calls.load(Ordering::SeqCst), 0);
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn transient_failure_publishes_exactly_one_retry_event() {
    let handler = Arc::new(FlakyHandler::new(1));
    let bus = Arc::new(InMemoryEventBus::new(4));
    let retry_calls = Arc::new(AtomicU32::new(0));
    bus.subscribe(
        "notification.retry",
        "retry-consumer",
        Arc::new(CountingRetrySubscriber { calls: retry_calls.clone() }),
    )
    .await
    .unwrap();

    let config = ConsumerRuntimeConfig::new("email", "notification.retry", 4);
    let runtime = ConsumerRuntime::new(handler, bus, idempotency_store().await, config);

    runtime.handle(record()).await.unwrap();
    assert_eq!(retry_calls.load(Ordering::SeqCst), 1);
}

#[ignore = "Requires Redis"]
#[tokio::test]
async fn redelivery_with_a_different_offset_is_deduplicated() {
    let handler = Arc::new(FlakyHandler::new(0));
    let bus = Arc::new(InMemoryEventBus::new(4));
    let config = ConsumerRuntimeConfig::new("email", "notification.retry", 4);
    let runtime = ConsumerRuntime::new(handler.clone(), bus, idempotency_store().await, config);

    // Same handler instance -> same business identity; a different offset
    // simulates a true Kafka redelivery that should still collide.
    let mut redelivered = record();
    redelivered.offset = 999;

    runtime.handle(record()).await.unwrap();
    runtime.handle(redelivered).await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1, "handler should only run once for a deduplicated redelivery");
}

struct CountingRetrySubscriber {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl EventHandler for CountingRetrySubscriber {
    async fn handle(&self, _record: InboundRecord) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
