use prometheus::{IntCounterVec, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct ResilienceMetrics {
    pub circuit_state_transitions: IntCounterVec,
    pub circuit_calls: IntCounterVec,
    pub bulkhead_rejections: IntCounterVec,
    pub rate_limit_decisions: IntCounterVec,
}

impl ResilienceMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let circuit_state_transitions = IntCounterVec::new(
            Opts::new(
                "resilience_circuit_state_transitions_total",
                "Circuit breaker state transitions",
            )
            .const_label("service", service.to_string()),
            &["dependency", "from", "to"],
        )
        .expect("valid metric opts for resilience_circuit_state_transitions_total");

        let circuit_calls = IntCounterVec::new(
            Opts::new("resilience_circuit_calls_total", "Circuit breaker call outcomes")
                .const_label("service", service.to_string()),
            &["dependency", "state", "result"],
        )
        .expect("valid metric opts for resilience_circuit_calls_total");

        let bulkhead_rejections = IntCounterVec::new(
            Opts::new("resilience_bulkhead_rejections_total", "Bulkhead saturation rejections")
                .const_label("service", service.to_string()),
            &["name"],
        )
        .expect("valid metric opts for resilience_bulkhead_rejections_total");

        let rate_limit_decisions = IntCounterVec::new(
            Opts::new("resilience_rate_limit_decisions_total", "Rate limiter admission decisions")
                .const_label("service", service.to_string()),
            &["action_key", "decision"],
        )
        .expect("valid metric opts for resilience_rate_limit_decisions_total");

        for metric in [
            Box::new(circuit_state_transitions.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(circuit_calls.clone()),
            Box::new(bulkhead_rejections.clone()),
            Box::new(rate_limit_decisions.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register resilience metric: {}", e);
            }
        }

        Self {
            circuit_state_transitions,
            circuit_calls,
            bulkhead_rejections,
            rate_limit_decisions,
        }
    }
}
