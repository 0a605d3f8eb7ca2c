//! Unified error taxonomy for the event-delivery core.
//!
//! Provides a single error type, conversion helpers, and a stable wire
//! representation shared by command handlers, consumers, the cache layer,
//! and the resilience fabric.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Standard error response for all services built on this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    pub status: u16,
    pub error_type: String,
    pub field_errors: Option<Vec<FieldError>>,
    pub retry_after_seconds: Option<u64>,
    pub timestamp: String,
}

/// The core's error taxonomy (spec §7). Kinds, not type names: each variant
/// maps to exactly one `errorCode` and one propagation rule.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field_errors: Option<Vec<FieldError>>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation { .. } => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::Unauthorized => 401,
            CoreError::Forbidden => 403,
            CoreError::InvalidStateTransition { .. } => 409,
            CoreError::RateLimited { .. } => 429,
            CoreError::ServiceUnavailable(_) => 503,
            CoreError::Transient(_) => 503,
            CoreError::Permanent(_) => 422,
            CoreError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "VALIDATION",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Unauthorized => "UNAUTHORIZED",
            CoreError::Forbidden => "FORBIDDEN",
            CoreError::InvalidStateTransition { .. } => "INVALID_STATUS_TRANSITION",
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            CoreError::Transient(_) => "TRANSIENT",
            CoreError::Permanent(_) => "PERMANENT",
            CoreError::Internal(_) => "INTERNAL",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "ValidationError",
            CoreError::NotFound(_) => "NotFoundError",
            CoreError::Conflict(_) => "ConflictError",
            CoreError::Unauthorized => "UnauthorizedError",
            CoreError::Forbidden => "ForbiddenError",
            CoreError::InvalidStateTransition { .. } => "InvalidStateTransitionError",
            CoreError::RateLimited { .. } => "RateLimitedError",
            CoreError::ServiceUnavailable(_) => "ServiceUnavailableError",
            CoreError::Transient(_) => "TransientError",
            CoreError::Permanent(_) => "PermanentError",
            CoreError::Internal(_) => "InternalError",
        }
    }

    /// Whether a consumer handler returning this error should be retried
    /// (routed to the retry topic) rather than dead-lettered immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Transient(_) | CoreError::ServiceUnavailable(_)
        )
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            CoreError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            CoreError::Validation { field_errors, .. } => field_errors.as_deref(),
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code(),
            error_type: self.error_type().to_string(),
            field_errors: self.field_errors().map(|f| f.to_vec()),
            retry_after_seconds: self.retry_after_seconds(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound("resource not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                CoreError::Transient(err.to_string())
            }
            _ => CoreError::Internal(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
            CoreError::Transient(err.to_string())
        } else {
            CoreError::Internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CoreError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CoreError::Unauthorized.status_code(), 401);
        assert_eq!(
            CoreError::RateLimited {
                retry_after_seconds: 5
            }
            .status_code(),
            429
        );
        assert_eq!(
            CoreError::InvalidStateTransition {
                from: "REJECTED".into(),
                to: "UNDER_REVIEW".into()
            }
            .status_code(),
            409
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CoreError::Forbidden.error_code(), "FORBIDDEN");
        assert_eq!(
            CoreError::InvalidStateTransition {
                from: "A".into(),
                to: "B".into()
            }
            .error_code(),
            "INVALID_STATUS_TRANSITION"
        );
        assert_eq!(
            CoreError::RateLimited {
                retry_after_seconds: 1
            }
            .error_code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn test_response_carries_retry_after() {
        let err = CoreError::RateLimited {
            retry_after_seconds: 30,
        };
        let response = err.to_response();
        assert_eq!(response.retry_after_seconds, Some(30));
        assert_eq!(response.status, 429);
    }

    #[test]
    fn test_response_carries_field_errors() {
        let err = CoreError::Validation {
            message: "bad input".into(),
            field_errors: Some(vec![FieldError {
                field: "coverLetter".into(),
                message: "too long".into(),
            }]),
        };
        let response = err.to_response();
        assert_eq!(response.field_errors.unwrap().len(), 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CoreError::Transient("timeout".into()).is_retryable());
        assert!(CoreError::ServiceUnavailable("circuit open".into()).is_retryable());
        assert!(!CoreError::Permanent("bad recipient".into()).is_retryable());
        assert!(!CoreError::Validation {
            message: "x".into(),
            field_errors: None
        }
        .is_retryable());
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_not_found() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
