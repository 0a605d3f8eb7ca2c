use chrono::{DateTime, Utc};
use error_handling::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of one job application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Shortlisted,
    Interview,
    Offered,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    /// Total transition table. `REJECTED` and `WITHDRAWN` are terminal;
    /// every other pair not listed here is invalid.
    pub fn can_transition_to(&self, new_status: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, new_status),
            (Submitted, UnderReview)
                | (Submitted, Rejected)
                | (Submitted, Withdrawn)
                | (UnderReview, Shortlisted)
                | (UnderReview, Rejected)
                | (UnderReview, Withdrawn)
                | (Shortlisted, Interview)
                | (Shortlisted, Rejected)
                | (Shortlisted, Withdrawn)
                | (Interview, Offered)
                | (Interview, Rejected)
                | (Interview, Withdrawn)
                | (Offered, Withdrawn)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Withdrawn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderReview => "UNDER_REVIEW",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Offered => "OFFERED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

/// One application, `(user_id, job_id)` unique at the data-store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(user_id: Uuid, job_id: Uuid, cover_letter: Option<String>, resume_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            job_id,
            status: ApplicationStatus::Submitted,
            cover_letter,
            resume_url,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attempt the transition, failing with `INVALID_STATUS_TRANSITION`
    /// rather than silently clamping or ignoring the request.
    pub fn transition_to(&mut self, new_status: ApplicationStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(new_status) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> Application {
        Application::new(Uuid::new_v4(), Uuid::new_v4(), None, None)
    }

    #[test]
    fn starts_submitted() {
        assert_eq!(app().status, ApplicationStatus::Submitted);
    }

    #[test]
    fn full_happy_path_reaches_offered() {
        let mut a = app();
        a.transition_to(ApplicationStatus::UnderReview).unwrap();
        a.transition_to(ApplicationStatus::Shortlisted).unwrap();
        a.transition_to(ApplicationStatus::Interview).unwrap();
        a.transition_to(ApplicationStatus::Offered).unwrap();
        assert_eq!(a.status, ApplicationStatus::Offered);
    }

    #[test]
    fn withdrawal_is_reachable_from_every_non_terminal_state() {
        for start in [
            ApplicationStatus::Submitted,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Interview,
            ApplicationStatus::Offered,
        ] {
            assert!(start.can_transition_to(ApplicationStatus::Withdrawn), "{:?}", start);
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut a = app();
        a.transition_to(ApplicationStatus::Rejected).unwrap();
        let err = a.transition_to(ApplicationStatus::UnderReview).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
    }

    #[test]
    fn offered_cannot_go_back_to_interview() {
        let mut a = app();
        a.transition_to(ApplicationStatus::UnderReview).unwrap();
        a.transition_to(ApplicationStatus::Shortlisted).unwrap();
        a.transition_to(ApplicationStatus::Interview).unwrap();
        a.transition_to(ApplicationStatus::Offered).unwrap();
        assert!(a.transition_to(ApplicationStatus::Interview).is_err());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut a = app();
        let err = a.transition_to(ApplicationStatus::Interview).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
    }
}
