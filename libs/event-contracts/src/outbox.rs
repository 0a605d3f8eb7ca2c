use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A domain event awaiting publication to the bus, written in the same
/// transaction as the domain row it describes (the Transactional Outbox
/// pattern). Rows are never re-published once `published=true`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: i64,
    pub event_type: String,
    /// Serialized event payload (JSON text).
    pub payload: String,
    pub topic: String,
    pub partition_key: String,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: i64,
        event_type: impl Into<String>,
        payload: impl Serialize,
        topic: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            event_type: event_type.into(),
            payload: serde_json::to_string(&payload)?,
            topic: topic.into(),
            partition_key: partition_key.into(),
            published: false,
            published_at: None,
            retry_count: 0,
            created_at: Utc::now(),
        })
    }

    pub fn mark_published(&mut self) {
        self.published = true;
        self.published_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.retry_count += 1;
    }

    /// Whether this event has exhausted its retry budget and has become a
    /// dead letter: it remains `published=false` but is excluded from
    /// further polling until an operator resets `retry_count`.
    pub fn is_dead_letter(&self, max_attempts: i32) -> bool {
        !self.published && self.retry_count >= max_attempts
    }
}
