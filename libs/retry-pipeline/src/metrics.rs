use prometheus::{IntCounter, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct RetryMetrics {
    pub success: IntCounter,
    pub failure: IntCounter,
    pub dead_lettered: IntCounter,
}

impl RetryMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let success = IntCounter::with_opts(
            Opts::new("retries_success_total", "Retries that succeeded on re-invocation")
                .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for retries_success_total");

        let failure = IntCounter::with_opts(
            Opts::new("retries_failure_total", "Retries that failed on re-invocation")
                .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for retries_failure_total");

        let dead_lettered = IntCounter::with_opts(
            Opts::new("retries_dead_letter_total", "Retries that exhausted max attempts")
                .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for retries_dead_letter_total");

        for metric in [
            Box::new(success.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(failure.clone()),
            Box::new(dead_lettered.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register retry-pipeline metric: {}", e);
            }
        }

        Self {
            success,
            failure,
            dead_lettered,
        }
    }
}
