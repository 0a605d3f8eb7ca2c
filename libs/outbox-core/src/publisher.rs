use crate::error::OutboxResult;
use crate::metrics::OutboxMetrics;
use crate::repository::OutboxRepository;
use event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Publisher tuning. Defaults match the documented contract: poll every
/// second, up to 100 unpublished events per pass, 5 attempts before an
/// event becomes a dead letter.
#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            max_attempts: 5,
        }
    }
}

impl OutboxPublisherConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("OUTBOX_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.poll_interval.as_millis() as u64),
            ),
            batch_size: std::env::var("OUTBOX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.batch_size),
            max_attempts: std::env::var("OUTBOX_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_attempts),
        }
    }
}

/// Totals for a single polling pass, surfaced as both a return value (for
/// tests) and Prometheus counters (for operators).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishBatchResult {
    pub published: u32,
    pub failed: u32,
    pub dead_lettered: u32,
}

/// Background poller: reads unpublished, non-dead-lettered outbox rows in
/// `created_at` order and publishes each to the bus keyed by
/// `partition_key`. `created_at` increases monotonically per process, so
/// processing the whole batch in that order is sufficient to preserve
/// per-`(topic, partition_key)` order without per-key serialization.
pub struct OutboxPublisher<R: OutboxRepository> {
    repository: Arc<R>,
    bus: Arc<dyn EventBus>,
    config: OutboxPublisherConfig,
    metrics: Option<OutboxMetrics>,
}

impl<R: OutboxRepository> OutboxPublisher<R> {
    pub fn new(repository: Arc<R>, bus: Arc<dyn EventBus>, config: OutboxPublisherConfig) -> Self {
        Self {
            repository,
            bus,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the poller forever. Intended to be spawned as its own task;
    /// errors within a pass are logged and the loop continues on the next
    /// tick rather than terminating the process.
    pub async fn run(&self) -> ! {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis(),
            max_attempts = self.config.max_attempts,
            "outbox publisher starting"
        );

        loop {
            match self.process_batch().await {
                Ok(result) if result.published > 0 || result.failed > 0 => {
                    info!(
                        published = result.published,
                        failed = result.failed,
                        dead_lettered = result.dead_lettered,
                        "outbox batch processed"
                    );
                }
                Ok(_) => debug!("no unpublished outbox events"),
                Err(e) => error!(error = %e, "outbox publisher pass failed"),
            }

            if let Some(metrics) = &self.metrics {
                if let Ok((pending, age)) = self.repository.pending_stats().await {
                    metrics.pending.set(pending);
                    metrics.oldest_pending_age_seconds.set(age);
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Process one batch; public so tests and operator tooling can drive a
    /// single pass deterministically instead of waiting on the poll loop.
    pub async fn process_batch(&self) -> OutboxResult<PublishBatchResult> {
        let events = self
            .repository
            .get_unpublished(self.config.batch_size, self.config.max_attempts)
            .await?;

        let mut result = PublishBatchResult::default();

        for event in events {
            match self
                .bus
                .publish(
                    &event.topic,
                    &event.partition_key,
                    event.payload.clone().into_bytes(),
                )
                .await
            {
                Ok(()) => {
                    if let Err(e) = self.repository.mark_published(event.id).await {
                        error!(
                            event_id = %event.id,
                            error = %e,
                            "event delivered to bus but marking published failed; will republish"
                        );
                        continue;
                    }
                    result.published += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.published.inc();
                    }
                }
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        topic = %event.topic,
                        partition_key = %event.partition_key,
                        retry_count = event.retry_count,
                        error = %e,
                        "failed to publish outbox event"
                    );

                    if let Err(mark_err) = self.repository.mark_failed(event.id).await {
                        error!(event_id = %event.id, error = %mark_err, "failed to record publish failure");
                        continue;
                    }
                    result.failed += 1;

                    let next_retry_count = event.retry_count + 1;
                    if next_retry_count >= self.config.max_attempts {
                        result.dead_lettered += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.dead_lettered.inc();
                        }
                        warn!(
                            event_id = %event.id,
                            event_type = %event.event_type,
                            retry_count = next_retry_count,
                            "outbox event exceeded max attempts, now a dead letter"
                        );
                    }
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use event_bus::{BusResult, EventHandler, InboundRecord};
    use event_contracts::OutboxEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeRepository {
        events: Mutex<Vec<OutboxEvent>>,
        mark_published_calls: AtomicUsize,
        mark_failed_calls: AtomicUsize,
    }

    impl FakeRepository {
        fn with_events(events: Vec<OutboxEvent>) -> Self {
            Self {
                events: Mutex::new(events),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl OutboxRepository for FakeRepository {
        async fn insert(
            &self,
            _tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
            _event: &OutboxEvent,
        ) -> OutboxResult<()> {
            unimplemented!("publisher tests never insert")
        }

        async fn get_unpublished(
            &self,
            _limit: i64,
            max_retries: i32,
        ) -> OutboxResult<Vec<OutboxEvent>> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| !e.published && e.retry_count < max_retries)
                .cloned()
                .collect())
        }

        async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
            self.mark_published_calls.fetch_add(1, Ordering::SeqCst);
            let mut events = self.events.lock().unwrap();
            if let Some(e) = events.iter_mut().find(|e| e.id == event_id) {
                e.mark_published();
            }
            Ok(())
        }

        async fn mark_failed(&self, event_id: Uuid) -> OutboxResult<()> {
            self.mark_failed_calls.fetch_add(1, Ordering::SeqCst);
            let mut events = self.events.lock().unwrap();
            if let Some(e) = events.iter_mut().find(|e| e.id == event_id) {
                e.mark_failed();
            }
            Ok(())
        }

        async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
            let count = self.events.lock().unwrap().iter().filter(|e| !e.published).count();
            Ok((count as i64, 0))
        }
    }

    struct AlwaysFailsBus;

    #[async_trait]
    impl EventBus for AlwaysFailsBus {
        async fn publish(&self, _topic: &str, _key: &str, _payload: Vec<u8>) -> BusResult<()> {
            Err(event_bus::BusError::Broker("boom".into()))
        }

        async fn subscribe(
            &self,
            _topic: &str,
            _group: &str,
            _handler: Arc<dyn EventHandler>,
        ) -> BusResult<()> {
            Ok(())
        }
    }

    fn make_event(topic: &str, partition_key: &str) -> OutboxEvent {
        OutboxEvent::new(
            "Application",
            42,
            "APPLICATION_CREATED",
            serde_json::json!({"applicationId": 1}),
            topic,
            partition_key,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn publishes_unpublished_events_and_marks_them() {
        let repo = Arc::new(FakeRepository::with_events(vec![make_event(
            "application.created",
            "42",
        )]));
        let bus = Arc::new(event_bus::InMemoryEventBus::new(4));
        let publisher = OutboxPublisher::new(repo.clone(), bus, OutboxPublisherConfig::default());

        let result = publisher.process_batch().await.unwrap();
        assert_eq!(result.published, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(repo.mark_published_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bus_failure_increments_retry_and_failed_count() {
        let repo = Arc::new(FakeRepository::with_events(vec![make_event(
            "application.created",
            "42",
        )]));
        let bus = Arc::new(AlwaysFailsBus);
        let config = OutboxPublisherConfig {
            max_attempts: 5,
            ..Default::default()
        };
        let publisher = OutboxPublisher::new(repo.clone(), bus, config);

        let result = publisher.process_batch().await.unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.dead_lettered, 0);
        assert_eq!(repo.events.lock().unwrap()[0].retry_count, 1);
    }

    #[tokio::test]
    async fn event_becomes_dead_letter_at_max_attempts() {
        let mut event = make_event("application.created", "42");
        event.retry_count = 4;
        let repo = Arc::new(FakeRepository::with_events(vec![event]));
        let bus = Arc::new(AlwaysFailsBus);
        let config = OutboxPublisherConfig {
            max_attempts: 5,
            ..Default::default()
        };
        let publisher = OutboxPublisher::new(repo.clone(), bus, config);

        let result = publisher.process_batch().await.unwrap();
        assert_eq!(result.dead_lettered, 1);
    }

    #[tokio::test]
    async fn dead_lettered_events_are_excluded_from_next_pass() {
        let mut event = make_event("application.created", "42");
        event.retry_count = 5;
        let repo = Arc::new(FakeRepository::with_events(vec![event]));
        let bus = Arc::new(AlwaysFailsBus);
        let config = OutboxPublisherConfig {
            max_attempts: 5,
            ..Default::default()
        };
        let publisher = OutboxPublisher::new(repo, bus, config);

        let result = publisher.process_batch().await.unwrap();
        assert_eq!(result, PublishBatchResult::default());
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = OutboxPublisherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 100);
    }
}
