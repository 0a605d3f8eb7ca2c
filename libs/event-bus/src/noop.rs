use crate::{BusResult, EventBus, EventHandler};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

/// Degraded-mode [`EventBus`] used when the configured broker is unreachable
/// at startup and the caller has chosen to keep serving traffic rather than
/// fail fast. Every publish is dropped; `subscribe` is a no-op since there is
/// nothing to deliver. Use only behind an explicit opt-in — this is data
/// loss, not a retry strategy.
pub struct NoopEventBus {
    dropped_count: AtomicU64,
    last_warning_time: AtomicU64,
    warning_interval_secs: u64,
    warned_this_session: AtomicBool,
}

impl NoopEventBus {
    pub fn new(warning_interval_secs: u64) -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            last_warning_time: AtomicU64::new(0),
            warning_interval_secs,
            warned_this_session: AtomicBool::new(false),
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventBus for NoopEventBus {
    async fn publish(&self, topic: &str, key: &str, _payload: Vec<u8>) -> BusResult<()> {
        let total_dropped = self.dropped_count.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.warned_this_session.swap(true, Ordering::Relaxed) {
            error!(
                topic = %topic,
                key = %key,
                "NoOp event bus active - FIRST EVENT DROPPED! Events are being lost. \
                 Set KAFKA_BROKERS or fail fast instead of falling back."
            );
        }

        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let last_warning = self.last_warning_time.load(Ordering::Relaxed);

        if now_secs >= last_warning + self.warning_interval_secs
            && self
                .last_warning_time
                .compare_exchange(last_warning, now_secs, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
        {
            warn!(
                total_dropped,
                topic = %topic,
                "event bus still in NoOp mode, continuing to drop events"
            );
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        _topic: &str,
        _group: &str,
        _handler: Arc<dyn EventHandler>,
    ) -> BusResult<()> {
        warn!("subscribe called on NoOp event bus; no records will ever be delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_counts_dropped_events() {
        let bus = NoopEventBus::new(60);
        bus.publish("application.created", "42", b"x".to_vec())
            .await
            .unwrap();
        bus.publish("application.created", "43", b"y".to_vec())
            .await
            .unwrap();
        assert_eq!(bus.dropped_count(), 2);
    }
}
