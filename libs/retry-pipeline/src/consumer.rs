use crate::backoff::RetryBackoffConfig;
use crate::metrics::RetryMetrics;
use async_trait::async_trait;
use error_handling::CoreError;
use event_bus::{EventHandler, InboundRecord};
use event_contracts::RetryEnvelope;
use tracing::{debug, info, warn};

/// Re-invokes the original handler for a failed event. Implemented by
/// consumer-runtime so this crate never needs to know about idempotency
/// keys, bulkheads, or channel dispatch — only timing.
#[async_trait]
pub trait RetryableHandler: Send + Sync {
    async fn reinvoke(&self, original_payload: &[u8], attempt: u32) -> Result<(), CoreError>;
}

/// Single-concurrency consumer of the retry topic. Concurrency is bounded
/// to 1 by subscribing a single instance to a single-partition topic
/// (§4.4) — this type performs no additional locking itself, since each
/// `EventBus` implementation's subscribe loop already awaits one handler
/// call at a time.
pub struct RetryConsumer<H: RetryableHandler> {
    handler: H,
    config: RetryBackoffConfig,
    metrics: Option<RetryMetrics>,
}

impl<H: RetryableHandler> RetryConsumer<H> {
    pub fn new(handler: H, config: RetryBackoffConfig) -> Self {
        Self {
            handler,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RetryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl<H: RetryableHandler> EventHandler for RetryConsumer<H> {
    async fn handle(&self, record: InboundRecord) -> anyhow::Result<()> {
        let envelope: RetryEnvelope<serde_json::Value> = serde_json::from_slice(&record.payload)?;

        if envelope.retry_attempt >= self.config.max_attempts {
            warn!(
                attempt = envelope.retry_attempt,
                max_attempts = self.config.max_attempts,
                reason = %envelope.retry_reason,
                "retry exhausted max attempts, dead-lettering"
            );
            if let Some(metrics) = &self.metrics {
                metrics.dead_lettered.inc();
            }
            return Ok(());
        }

        let delay = self.config.jittered_delay(envelope.retry_attempt);
        debug!(attempt = envelope.retry_attempt, delay_ms = delay.as_millis(), "sleeping before retry");
        tokio::time::sleep(delay).await;

        let original_payload = serde_json::to_vec(&envelope.original)?;
        match self.handler.reinvoke(&original_payload, envelope.retry_attempt).await {
            Ok(()) => {
                info!(attempt = envelope.retry_attempt, "retry succeeded");
                if let Some(metrics) = &self.metrics {
                    metrics.success.inc();
                }
            }
            Err(e) => {
                warn!(attempt = envelope.retry_attempt, error = %e, "retry failed");
                if let Some(metrics) = &self.metrics {
                    metrics.failure.inc();
                }
                // Do not re-publish here; the handler's own processing path
                // (shared with the initial dispatch) decides whether to
                // schedule a further retry.
            }
        }

        Ok(())
    }
}
