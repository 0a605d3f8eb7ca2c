use crate::event_id::compute_event_id;
use crate::handler::ConsumerHandler;
use crate::metrics::ConsumerMetrics;
use async_trait::async_trait;
use chrono::Utc;
use error_handling::CoreError;
use event_bus::{EventBus, EventHandler, InboundRecord};
use event_contracts::RetryEnvelope;
use idempotency_store::{AcquireOutcome, IdempotencyStore};
use resilience::{Bulkhead, ResilienceError};
use retry_pipeline::{RetryBackoffConfig, RetryableHandler};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Dedup TTL floor from §4.3: must exceed worst-case consumer lag.
pub const DEFAULT_DEDUP_TTL: Duration = idempotency_store::MIN_DEDUP_TTL;

#[derive(Debug, Clone)]
pub struct ConsumerRuntimeConfig {
    /// Identifies this binding in dedup keys and metrics (e.g. `email`, `sms`, `push`).
    pub channel: String,
    /// Destination topic for failed records, partitioned by the handler's `retry_partition_key`.
    pub retry_topic: String,
    pub dedup_ttl: Duration,
    /// Bounded concurrency for this channel's handler invocations (§4.3, §5).
    pub bulkhead_size: usize,
}

impl ConsumerRuntimeConfig {
    pub fn new(channel: impl Into<String>, retry_topic: impl Into<String>, bulkhead_size: usize) -> Self {
        Self {
            channel: channel.into(),
            retry_topic: retry_topic.into(),
            dedup_ttl: DEFAULT_DEDUP_TTL,
            bulkhead_size,
        }
    }
}

/// Wraps a [`ConsumerHandler`] with idempotency dedup, bounded concurrency,
/// and retry-topic routing (§4.3). Implements both [`EventHandler`], so it
/// can be subscribed to a channel's source topic, and [`RetryableHandler`],
/// so the same dedup/bulkhead/retry-routing logic applies when
/// `retry-pipeline` re-invokes it after a backoff.
pub struct ConsumerRuntime<H: ConsumerHandler> {
    handler: Arc<H>,
    bus: Arc<dyn EventBus>,
    idempotency: IdempotencyStore,
    bulkhead: Bulkhead,
    config: ConsumerRuntimeConfig,
    retry_backoff: RetryBackoffConfig,
    metrics: Option<ConsumerMetrics>,
}

impl<H: ConsumerHandler> ConsumerRuntime<H> {
    pub fn new(
        handler: Arc<H>,
        bus: Arc<dyn EventBus>,
        idempotency: IdempotencyStore,
        config: ConsumerRuntimeConfig,
    ) -> Self {
        let bulkhead = Bulkhead::new(config.channel.clone(), config.bulkhead_size);
        Self {
            handler,
            bus,
            idempotency,
            bulkhead,
            config,
            retry_backoff: RetryBackoffConfig::default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ConsumerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Shared processing path for both the initial dispatch and a
    /// retry-pipeline re-invocation: acquire the dedup key, run the handler
    /// behind the channel's bulkhead, and on failure release the key and
    /// route to the retry topic (unless the error is permanent).
    async fn process(&self, event_id: &str, payload: &[u8], next_attempt: u32) -> Result<(), CoreError> {
        match self.idempotency.acquire(event_id, self.config.dedup_ttl).await {
            Ok(AcquireOutcome::Duplicate) => {
                debug!(event_id, channel = %self.config.channel, "duplicate delivery, skipping");
                if let Some(metrics) = &self.metrics {
                    metrics.duplicates.with_label_values(&[&self.config.channel]).inc();
                }
                return Ok(());
            }
            Ok(AcquireOutcome::FirstTime) => {}
            Err(e) => {
                warn!(event_id, error = %e, "idempotency store unavailable, processing without dedup");
            }
        }

        let handler = self.handler.clone();
        let owned_payload = payload.to_vec();
        let outcome = self
            .bulkhead
            .execute(|| async move { handler.handle(&owned_payload).await })
            .await;

        match outcome {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.processed.with_label_values(&[&self.config.channel, "success"]).inc();
                }
                Ok(())
            }
            Err(ResilienceError::BulkheadFull { in_flight, max, .. }) => {
                let reason = format!("bulkhead full ({in_flight}/{max})");
                self.route_to_retry(event_id, payload, next_attempt, &reason).await;
                Err(CoreError::ServiceUnavailable(reason))
            }
            Err(ResilienceError::Inner(CoreError::Transient(reason))) => {
                self.route_to_retry(event_id, payload, next_attempt, &reason).await;
                Err(CoreError::Transient(reason))
            }
            Err(ResilienceError::Inner(CoreError::Permanent(reason))) => {
                self.dead_letter(event_id, &reason).await;
                Err(CoreError::Permanent(reason))
            }
            Err(ResilienceError::Inner(other)) => {
                error!(event_id, error = %other, "unclassified handler failure, dead-lettering");
                self.dead_letter(event_id, &other.to_string()).await;
                Err(other)
            }
            Err(other) => {
                let reason = other.to_string();
                error!(event_id, error = %reason, "resilience fabric rejected the call");
                self.dead_letter(event_id, &reason).await;
                Err(CoreError::ServiceUnavailable(reason))
            }
        }
    }

    async fn route_to_retry(&self, event_id: &str, payload: &[u8], attempt: u32, reason: &str) {
        if let Err(e) = self.idempotency.release(event_id).await {
            warn!(event_id, error = %e, "failed to release idempotency key before retry");
        }

        let original: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                error!(event_id, error = %e, "payload is not valid JSON, cannot build retry envelope");
                return;
            }
        };

        let delay_ms = self.retry_backoff.jittered_delay(attempt).as_millis() as u64;
        let envelope = RetryEnvelope::new(
            original,
            attempt,
            self.config.channel.clone(),
            delay_ms,
            reason,
            Utc::now().timestamp(),
        );

        let partition_key = self.handler.retry_partition_key(payload);
        let payload = match serde_json::to_vec(&envelope) {
            Ok(p) => p,
            Err(e) => {
                error!(event_id, error = %e, "failed to serialize retry envelope");
                return;
            }
        };

        if let Err(e) = self.bus.publish(&self.config.retry_topic, &partition_key, payload).await {
            error!(event_id, error = %e, "failed to publish retry event");
        } else if let Some(metrics) = &self.metrics {
            metrics.retried.with_label_values(&[&self.config.channel]).inc();
        }
    }

    async fn dead_letter(&self, event_id: &str, reason: &str) {
        warn!(event_id, channel = %self.config.channel, reason, "dead-lettering without scheduling a retry");
        if let Err(e) = self.idempotency.release(event_id).await {
            warn!(event_id, error = %e, "failed to release idempotency key on dead letter");
        }
        if let Some(metrics) = &self.metrics {
            metrics.dead_lettered.with_label_values(&[&self.config.channel]).inc();
            metrics.processed.with_label_values(&[&self.config.channel, "failure"]).inc();
        }
    }
}

#[async_trait]
impl<H: ConsumerHandler> EventHandler for ConsumerRuntime<H> {
    async fn handle(&self, record: InboundRecord) -> anyhow::Result<()> {
        let business_identity = self.handler.business_identity(&record.payload);
        let event_id = compute_event_id(&self.config.channel, business_identity, &record);

        // §4.3 step 6: ack the original record regardless of the handler's
        // outcome. Failures have already been routed to the retry topic by
        // `process`; nothing further to propagate to the bus.
        let _ = self.process(&event_id, &record.payload, 1).await;
        Ok(())
    }
}

#[async_trait]
impl<H: ConsumerHandler> RetryableHandler for ConsumerRuntime<H> {
    async fn reinvoke(&self, original_payload: &[u8], attempt: u32) -> Result<(), CoreError> {
        let business_identity = self.handler.business_identity(original_payload);
        let event_id = match business_identity {
            Some((event_type, aggregate_id)) => format!("{}:{}:{}", self.config.channel, event_type, aggregate_id),
            // No business identity and no transport record here (the retry
            // pipeline only hands us the original payload) — key off the
            // payload itself so two distinct events retried at the same
            // attempt number don't collide.
            None => format!("{}:retry:{:x}", self.config.channel, hash_payload(original_payload)),
        };
        self.process(&event_id, original_payload, attempt + 1).await
    }
}

/// Lets a shared handle be handed to [`retry_pipeline::RetryConsumer`]
/// directly: the same instance is subscribed to its source topic as an
/// `Arc<dyn EventHandler>` and owned by the retry consumer as a
/// `RetryableHandler`.
#[async_trait]
impl<H: ConsumerHandler> RetryableHandler for Arc<ConsumerRuntime<H>> {
    async fn reinvoke(&self, original_payload: &[u8], attempt: u32) -> Result<(), CoreError> {
        (**self).reinvoke(original_payload, attempt).await
    }
}

fn hash_payload(payload: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}
