//! Centralized error handling for the CrossLend risk engine
//!
//! This module provides a unified error type for loan lifecycle, scoring,
//! endorsement, and cross-chain operations, with stable error codes for
//! callers and a retryability flag for the messenger retry policy.

use thiserror::Error;
use uuid::Uuid;

/// Domain error type for the lending engine
#[derive(Error, Debug)]
pub enum LendingError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Insufficient collateral: {collateral_value} provided, {required} required")]
    InsufficientCollateral { collateral_value: f64, required: f64 },

    #[error("Invalid loan state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid endorsement: {0}")]
    InvalidEndorsement(Uuid),

    #[error("Endorsement already processed: {0}")]
    AlreadyProcessed(Uuid),

    #[error("Signature verification failed: {0}")]
    Verification(String),

    #[error("Cross-chain message timed out: loan {loan_id}, action {action}")]
    MessengerTimeout { loan_id: Uuid, action: String },

    #[error("Cross-chain message failed: loan {loan_id}, action {action}: {reason}")]
    MessengerFailure {
        loan_id: Uuid,
        action: String,
        reason: String,
    },

    #[error("Disbursement pending for loan {0}: outcome unknown, awaiting reconciliation")]
    DisbursementPending(Uuid),

    #[error("Settlement pending for loan {0}: outcome unknown, awaiting reconciliation")]
    SettlementPending(Uuid),

    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl LendingError {
    /// Get the stable error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            LendingError::NotFound(_) => "NOT_FOUND",
            LendingError::Validation(_) => "VALIDATION_ERROR",
            LendingError::InvalidAmount(_) => "INVALID_AMOUNT",
            LendingError::InsufficientCollateral { .. } => "INSUFFICIENT_COLLATERAL",
            LendingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LendingError::InvalidEndorsement(_) => "INVALID_ENDORSEMENT",
            LendingError::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            LendingError::Verification(_) => "VERIFICATION_FAILED",
            LendingError::MessengerTimeout { .. } => "MESSENGER_TIMEOUT",
            LendingError::MessengerFailure { .. } => "MESSENGER_FAILURE",
            LendingError::DisbursementPending(_) => "DISBURSEMENT_PENDING",
            LendingError::SettlementPending(_) => "SETTLEMENT_PENDING",
            LendingError::ConcurrentModification => "CONCURRENT_MODIFICATION",
            LendingError::Database(_) => "DATABASE_ERROR",
            LendingError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// Whether the retry policy may re-send the operation that produced this error.
    ///
    /// Timeouts and transport failures are retryable; domain rejections and
    /// pending-reconciliation states are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LendingError::MessengerTimeout { .. }
                | LendingError::MessengerFailure { .. }
                | LendingError::ExternalService(_)
        )
    }
}

// Convenience conversions from common error types

impl From<sqlx::Error> for LendingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LendingError::NotFound("Resource not found".to_string()),
            _ => LendingError::Database(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for LendingError {
    fn from(err: validator::ValidationErrors) -> Self {
        LendingError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for LendingError {
    fn from(err: reqwest::Error) -> Self {
        LendingError::ExternalService(err.to_string())
    }
}

impl From<serde_json::Error> for LendingError {
    fn from(err: serde_json::Error) -> Self {
        LendingError::Validation(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias using LendingError
pub type LendingResult<T> = Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LendingError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            LendingError::InvalidAmount(-5.0).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            LendingError::InsufficientCollateral {
                collateral_value: 100.0,
                required: 120.0
            }
            .error_code(),
            "INSUFFICIENT_COLLATERAL"
        );
        assert_eq!(
            LendingError::ConcurrentModification.error_code(),
            "CONCURRENT_MODIFICATION"
        );
    }

    #[test]
    fn test_retryability() {
        let loan_id = Uuid::new_v4();

        assert!(LendingError::MessengerTimeout {
            loan_id,
            action: "disburse_funds".to_string()
        }
        .is_retryable());
        assert!(LendingError::ExternalService("gateway down".to_string()).is_retryable());

        // Domain rejections must never be retried
        assert!(!LendingError::InvalidAmount(0.0).is_retryable());
        assert!(!LendingError::DisbursementPending(loan_id).is_retryable());
        assert!(!LendingError::ConcurrentModification.is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = LendingError::InsufficientCollateral {
            collateral_value: 1000.0,
            required: 1200.0,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("1200"));

        let loan_id = Uuid::new_v4();
        let err = LendingError::MessengerFailure {
            loan_id,
            action: "burn_and_unlock".to_string(),
            reason: "gateway rejected".to_string(),
        };
        assert!(err.to_string().contains("burn_and_unlock"));
        assert!(err.to_string().contains(&loan_id.to_string()));
    }

    #[test]
    fn test_sqlx_conversion() {
        let err: LendingError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
