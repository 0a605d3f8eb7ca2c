//! Wire contracts shared between the outbox, the event bus, and every
//! consumer: the envelope every event travels in, the outbox row shape, and
//! the domain event payloads this core knows how to route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod events;
pub mod outbox;

pub use events::{ApplicationEvent, ApplicationEventType, JobEvent, JobEventType, RetryEnvelope};
pub use outbox::OutboxEvent;

/// Current schema version for all events carried through the bus.
pub const SCHEMA_VERSION: u32 = 1;

/// Base envelope every event is wrapped in once it leaves the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub source: String,
    pub correlation_id: Option<Uuid>,
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            source: source.into(),
            correlation_id: None,
            data,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// Logical topic names used by the core. Partitioning and retention are a
/// property of the bus adapter, not of these constants.
pub mod topics {
    pub const APPLICATION_CREATED: &str = "application.created";
    pub const JOB_LIFECYCLE: &str = "job.lifecycle";
    pub const NOTIFICATION_RETRY: &str = "notification.retry";
    /// Failed cache-invalidation handler runs land here instead of
    /// `NOTIFICATION_RETRY`; nothing currently consumes this topic, so a
    /// failure is dropped rather than retried, which only widens the
    /// search-cache staleness window.
    pub const CACHE_INVALIDATION_RETRY: &str = "cache.invalidation.retry";
}

pub fn is_compatible(current_version: u32, message_version: u32) -> bool {
    current_version == message_version
}
