//! Abstraction over a partitioned, ordered, at-least-once log (Kafka-shaped),
//! with a Kafka-backed implementation, an in-memory implementation for tests,
//! and a no-op degraded-mode implementation for when the broker is
//! unreachable at startup.
//!
//! Consumers never redeliver on handler failure: per §4.3 of the event
//! delivery contract, a record is always acknowledged once its handler has
//! run, and retries are carried on a separate retry topic rather than by
//! withholding the Kafka commit.

mod error;
mod kafka;
mod memory;
mod noop;

pub use error::{BusError, BusResult};
pub use kafka::KafkaEventBus;
pub use memory::InMemoryEventBus;
pub use noop::NoopEventBus;

use async_trait::async_trait;
use std::sync::Arc;

/// A single record as delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Business logic invoked for each record delivered to a subscription.
/// Implementations should be effect-idempotent; the bus itself only
/// guarantees at-least-once delivery, never exactly-once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, record: InboundRecord) -> anyhow::Result<()>;
}

/// Partitioned, ordered, at-least-once event log.
///
/// Partition assignment is `hash(key) mod N`; ordering is preserved within a
/// partition only. `subscribe` assigns each topic-partition to at most one
/// member of a consumer group; acknowledgment is per-record and automatic
/// offset commit is never used.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()>;

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<()>;
}
