use chrono::{DateTime, NaiveDate, Utc};
use error_handling::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Draft,
    Active,
    Paused,
    Closed,
    Expired,
}

/// The cause of a transition, because `Active -> Expired` is the one
/// transition a caller may never request directly (§3): it happens only
/// through [`Job::expire_if_past_deadline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Requested,
    ScheduledSweep,
}

impl JobStatus {
    pub fn can_transition_to(&self, new_status: JobStatus, cause: TransitionCause) -> bool {
        use JobStatus::*;
        match (self, new_status, cause) {
            (Active, Expired, TransitionCause::ScheduledSweep) => true,
            (_, Expired, TransitionCause::Requested) => false,
            (Draft, Active, _) => true,
            (Active, Paused, _) => true,
            (Paused, Active, _) => true,
            (Active, Closed, _) => true,
            (Paused, Closed, _) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "DRAFT",
            JobStatus::Active => "ACTIVE",
            JobStatus::Paused => "PAUSED",
            JobStatus::Closed => "CLOSED",
            JobStatus::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub application_deadline: Option<NaiveDate>,
    pub view_count: i64,
    pub application_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(application_deadline: Option<NaiveDate>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Draft,
            application_deadline,
            view_count: 0,
            application_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, new_status: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(new_status, TransitionCause::Requested) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Called only by the scheduled sweep (§4.8), never from a request
    /// handler. A no-op if the job isn't active or hasn't reached its
    /// deadline, so the sweep can call it unconditionally on every row.
    pub fn expire_if_past_deadline(&mut self, today: NaiveDate) -> bool {
        let past_deadline = self.application_deadline.is_some_and(|d| d < today);
        if self.status == JobStatus::Active && past_deadline {
            self.status = JobStatus::Expired;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    pub fn record_view(&mut self) {
        self.view_count += 1;
    }

    pub fn record_application(&mut self) {
        self.application_count += 1;
    }
}
