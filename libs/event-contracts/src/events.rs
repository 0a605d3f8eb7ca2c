use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `eventType` values carried by `application.created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationEventType {
    ApplicationCreated,
    ApplicationStatusChanged,
    ApplicationWithdrawn,
}

/// Payload published whenever an application is created or changes status.
/// Partition key is `jobId` (stringified) so that all events for a given
/// job are observed in order by any one consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEvent {
    pub event_type: ApplicationEventType,
    pub application_id: i64,
    pub job_id: i64,
    pub user_id: i64,
    pub status: String,
    pub timestamp: i64,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ApplicationEvent {
    pub fn partition_key(&self) -> String {
        self.job_id.to_string()
    }
}

/// `eventType` values carried by `job.lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobEventType {
    JobCreated,
    JobUpdated,
    JobStatusChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub event_type: JobEventType,
    pub job_id: i64,
    pub status: String,
    pub timestamp: i64,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl JobEvent {
    pub fn partition_key(&self) -> String {
        self.job_id.to_string()
    }
}

/// Wraps a failed event with retry bookkeeping before it's republished to
/// `notification.retry`, partitioned by `userId` so a single recipient's
/// retries stay ordered relative to each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEnvelope<T> {
    #[serde(flatten)]
    pub original: T,
    #[serde(rename = "_retry_attempt")]
    pub retry_attempt: u32,
    #[serde(rename = "_retry_channel")]
    pub retry_channel: String,
    #[serde(rename = "_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(rename = "_retry_reason")]
    pub retry_reason: String,
    #[serde(rename = "_retry_scheduled_at")]
    pub retry_scheduled_at: i64,
}

impl<T> RetryEnvelope<T> {
    pub fn new(
        original: T,
        retry_attempt: u32,
        retry_channel: impl Into<String>,
        retry_delay_ms: u64,
        retry_reason: impl Into<String>,
        retry_scheduled_at: i64,
    ) -> Self {
        Self {
            original,
            retry_attempt,
            retry_channel: retry_channel.into(),
            retry_delay_ms,
            retry_reason: retry_reason.into(),
            retry_scheduled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_event_partitions_by_job_id() {
        let event = ApplicationEvent {
            event_type: ApplicationEventType::ApplicationCreated,
            application_id: 1,
            job_id: 42,
            user_id: 7,
            status: "SUBMITTED".to_string(),
            timestamp: 0,
            metadata: None,
        };
        assert_eq!(event.partition_key(), "42");
    }

    #[test]
    fn application_event_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ApplicationEventType::ApplicationStatusChanged).unwrap();
        assert_eq!(json, "\"APPLICATION_STATUS_CHANGED\"");
    }

    #[test]
    fn retry_envelope_flattens_original_fields() {
        let event = JobEvent {
            event_type: JobEventType::JobStatusChanged,
            job_id: 42,
            status: "CLOSED".to_string(),
            timestamp: 0,
            metadata: None,
        };
        let wrapped = RetryEnvelope::new(event, 1, "email", 1000, "smtp_timeout", 0);
        let json = serde_json::to_value(&wrapped).unwrap();
        assert_eq!(json["jobId"], serde_json::json!(42));
        assert_eq!(json["_retry_attempt"], serde_json::json!(1));
    }
}
