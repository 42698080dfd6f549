//! Route optimization errors

use thiserror::Error;
use uuid::Uuid;

use crate::types::{ErrorResponse, OptimizationStatus};

/// Errors surfaced by the optimization engine
#[derive(Debug, Error)]
pub enum OptimizationError {
    /// Bad input: too few located events, malformed date, unknown events
    #[error("{0}")]
    Validation(String),

    /// Proposal does not exist or belongs to another user
    #[error("Optimization not found")]
    NotFound,

    /// Apply/reject on a proposal that is no longer `optimized`
    #[error("Optimization already processed (status: {0})")]
    AlreadyProcessed(OptimizationStatus),

    /// Unexpected failure inside the optimization pipeline
    #[error("Optimization failed: {0:#}")]
    Failed(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Persisted data could not be decoded into typed values
    #[error("Corrupt optimization data: {0}")]
    Corrupt(String),
}

impl OptimizationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wire error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyProcessed(_) => "PRECONDITION_FAILED",
            Self::Failed(_) => "OPTIMIZATION_FAILED",
            Self::Storage(_) => "DATABASE_ERROR",
            Self::Corrupt(_) => "CORRUPT_DATA",
        }
    }

    /// Build the reply sent back to the caller.
    ///
    /// Storage and decoding failures get a fixed message; their cause is only
    /// logged by the handler.
    pub fn to_response(&self, request_id: Uuid) -> ErrorResponse {
        match self {
            Self::Failed(cause) => {
                ErrorResponse::new(request_id, self.code(), "Optimization failed")
                    .with_details(serde_json::json!({ "cause": format!("{:#}", cause) }))
            }
            Self::Storage(_) => ErrorResponse::new(request_id, self.code(), "Database error"),
            Self::Corrupt(_) => {
                ErrorResponse::new(request_id, self.code(), "Stored optimization data is unreadable")
            }
            _ => ErrorResponse::new(request_id, self.code(), self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_error_codes() {
        assert_eq!(OptimizationError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(OptimizationError::NotFound.code(), "NOT_FOUND");
        assert_eq!(
            OptimizationError::AlreadyProcessed(OptimizationStatus::Applied).code(),
            "PRECONDITION_FAILED"
        );
        assert_eq!(OptimizationError::Failed(anyhow!("boom")).code(), "OPTIMIZATION_FAILED");
        assert_eq!(OptimizationError::Corrupt("bad".into()).code(), "CORRUPT_DATA");
    }

    #[test]
    fn test_already_processed_message_names_status() {
        let error = OptimizationError::AlreadyProcessed(OptimizationStatus::Rejected);
        assert_eq!(error.to_string(), "Optimization already processed (status: rejected)");
    }

    #[test]
    fn test_failed_response_carries_cause_in_details() {
        let cause = anyhow!("connection reset").context("Failed to store optimization");
        let response = OptimizationError::Failed(cause).to_response(Uuid::nil());

        assert_eq!(response.error.code, "OPTIMIZATION_FAILED");
        assert_eq!(response.error.message, "Optimization failed");
        let details = response.error.details.unwrap();
        assert_eq!(
            details["cause"],
            "Failed to store optimization: connection reset"
        );
    }

    #[test]
    fn test_storage_response_hides_database_detail() {
        let error = OptimizationError::Storage(sqlx::Error::Protocol(
            "relation \"route_optimizations\" does not exist".into(),
        ));
        let response = error.to_response(Uuid::nil());

        assert_eq!(response.error.code, "DATABASE_ERROR");
        assert_eq!(response.error.message, "Database error");
        assert!(response.error.details.is_none());
        // The full cause stays available for the server log
        assert!(error.to_string().contains("route_optimizations"));
    }

    #[test]
    fn test_corrupt_response_hides_decode_detail() {
        let response = OptimizationError::Corrupt("invalid status 'pending'".into()).to_response(Uuid::nil());
        assert_eq!(response.error.code, "CORRUPT_DATA");
        assert!(!response.error.message.contains("pending"));
    }

    #[test]
    fn test_validation_response_uses_message() {
        let response = OptimizationError::validation("At least 2 events with a location are required")
            .to_response(Uuid::nil());
        assert_eq!(response.error.message, "At least 2 events with a location are required");
        assert!(response.error.details.is_none());
    }
}
