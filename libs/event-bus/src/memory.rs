use crate::{BusResult, EventBus, EventHandler, InboundRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process [`EventBus`] used by integration tests and local development.
/// Preserves per-partition order by serializing delivery behind a lock keyed
/// on `(topic, partition)`; partition assignment is `hash(key) mod N`, same
/// rule as the Kafka-backed adapter.
pub struct InMemoryEventBus {
    num_partitions: i32,
    subscribers: DashMap<String, Vec<(String, Arc<dyn EventHandler>)>>,
    offsets: DashMap<(String, i32), AtomicI64>,
    partition_locks: DashMap<(String, i32), Arc<Mutex<()>>>,
}

impl InMemoryEventBus {
    pub fn new(num_partitions: i32) -> Self {
        Self {
            num_partitions,
            subscribers: DashMap::new(),
            offsets: DashMap::new(),
            partition_locks: DashMap::new(),
        }
    }

    fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.num_partitions.max(1) as u64) as i32
    }

    fn next_offset(&self, topic: &str, partition: i32) -> i64 {
        self.offsets
            .entry((topic.to_string(), partition))
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(1, Ordering::SeqCst)
    }

    fn lock_for(&self, topic: &str, partition: i32) -> Arc<Mutex<()>> {
        self.partition_locks
            .entry((topic.to_string(), partition))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let partition = self.partition_for(key);
        let offset = self.next_offset(topic, partition);

        let record = InboundRecord {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.to_string(),
            payload,
        };

        let lock = self.lock_for(topic, partition);
        let _guard = lock.lock().await;

        if let Some(subs) = self.subscribers.get(topic) {
            for (group, handler) in subs.iter() {
                // Per §4.3: ack regardless of handler outcome; the caller's
                // consumer runtime is responsible for retry routing.
                if let Err(e) = handler.handle(record.clone()).await {
                    tracing::warn!(topic = %topic, group = %group, error = %e, "handler failed");
                }
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<()> {
        self.subscribers
            .entry(topic.to_string())
            .or_default()
            .push((group.to_string(), handler));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _record: InboundRecord) -> anyhow::Result<()> {
            self.count.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_published_records_to_subscribers() {
        let bus = InMemoryEventBus::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "application.created",
            "test-group",
            Arc::new(CountingHandler {
                count: count.clone(),
            }),
        )
        .await
        .unwrap();

        bus.publish("application.created", "42", b"payload".to_vec())
            .await
            .unwrap();
        bus.publish("application.created", "42", b"payload2".to_vec())
            .await
            .unwrap();

        assert_eq!(count.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn partitioning_is_deterministic_for_same_key() {
        let bus = InMemoryEventBus::new(8);
        assert_eq!(bus.partition_for("42"), bus.partition_for("42"));
    }
}
