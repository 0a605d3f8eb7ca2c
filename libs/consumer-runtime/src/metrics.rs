use prometheus::{IntCounterVec, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct ConsumerMetrics {
    pub processed: IntCounterVec,
    pub duplicates: IntCounterVec,
    pub retried: IntCounterVec,
    pub dead_lettered: IntCounterVec,
}

impl ConsumerMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let processed = IntCounterVec::new(
            Opts::new("consumer_processed_total", "Records whose handler ran to completion")
                .const_label("service", service.to_string()),
            &["channel", "result"],
        )
        .expect("valid metric opts for consumer_processed_total");

        let duplicates = IntCounterVec::new(
            Opts::new("consumer_duplicates_total", "Records skipped as idempotency duplicates")
                .const_label("service", service.to_string()),
            &["channel"],
        )
        .expect("valid metric opts for consumer_duplicates_total");

        let retried = IntCounterVec::new(
            Opts::new("consumer_retried_total", "Records routed to the retry topic")
                .const_label("service", service.to_string()),
            &["channel"],
        )
        .expect("valid metric opts for consumer_retried_total");

        let dead_lettered = IntCounterVec::new(
            Opts::new("consumer_dead_lettered_total", "Records dead-lettered without a retry")
                .const_label("service", service.to_string()),
            &["channel"],
        )
        .expect("valid metric opts for consumer_dead_lettered_total");

        for metric in [
            Box::new(processed.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(duplicates.clone()),
            Box::new(retried.clone()),
            Box::new(dead_lettered.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register consumer-runtime metric: {}", e);
            }
        }

        Self {
            processed,
            duplicates,
            retried,
            dead_lettered,
        }
    }
}
