use async_trait::async_trait;
use error_handling::CoreError;

/// Business logic bound to one `(topic, group)` subscription. The runtime
/// around it owns dedup, concurrency bounding, and retry routing; this
/// trait only ever sees the raw payload.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), CoreError>;

    /// `(eventType, aggregateId)` used to build the dedup key. `None` falls
    /// back to the transport identity (topic-partition-offset).
    fn business_identity(&self, payload: &[u8]) -> Option<(String, String)> {
        let _ = payload;
        None
    }

    /// Key used to partition the retry topic — a stable per-recipient key
    /// (e.g. `userId`) so one recipient's retries stay ordered.
    fn retry_partition_key(&self, payload: &[u8]) -> String;
}
