//! Builds the process-wide [`EventBus`], falling back to a degraded no-op
//! bus when Kafka is unreachable at startup rather than panicking.
//! Generalizes `social-service`'s `outbox_worker.rs` `build_publisher`
//! (Kafka-or-NoOp, with an explicit opt-in to fail fast instead) from one
//! outbox-shaped publisher to the full `EventBus` trait.

use crate::config::BusConfig;
use event_bus::{EventBus, KafkaEventBus, NoopEventBus};
use std::sync::Arc;
use tracing::{error, info, warn};

pub enum BusBuildResult {
    Kafka(Arc<dyn EventBus>),
    Noop(Arc<dyn EventBus>, String),
    Failed(String),
}

pub fn build_event_bus(config: &BusConfig) -> BusBuildResult {
    if !config.kafka_enabled {
        info!("GATEWAY_USE_KAFKA disabled, using NoOp event bus");
        return BusBuildResult::Noop(
            Arc::new(NoopEventBus::new(config.noop_warning_interval_secs)),
            "Kafka disabled by configuration".to_string(),
        );
    }

    if config.brokers.is_empty() {
        let reason = "KAFKA_BROKERS not set".to_string();
        if config.fail_on_kafka_unavailable {
            return BusBuildResult::Failed(reason);
        }
        warn!("{}; using NoOp event bus - EVENTS WILL BE DROPPED", reason);
        return BusBuildResult::Noop(Arc::new(NoopEventBus::new(config.noop_warning_interval_secs)), reason);
    }

    match KafkaEventBus::new(config.brokers.clone()) {
        Ok(bus) => {
            info!(brokers = %config.brokers, "gateway event bus using Kafka");
            BusBuildResult::Kafka(Arc::new(bus))
        }
        Err(e) => {
            let reason = format!("failed to create Kafka event bus: {}", e);
            if config.fail_on_kafka_unavailable {
                return BusBuildResult::Failed(reason);
            }
            error!(error = %reason, "falling back to NoOp event bus - EVENTS WILL BE DROPPED!");
            BusBuildResult::Noop(Arc::new(NoopEventBus::new(config.noop_warning_interval_secs)), reason)
        }
    }
}
