//! Endorsement models for CrossLend
//!
//! An endorsement is a peer's signed promise to absorb a slice of a
//! borrower's default. The percentage bounds are part of the protocol, so
//! they are enforced both at the DTO boundary and at the repository write.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Minimum share of a default an endorser may take on, in percent
pub const MIN_ENDORSEMENT_PERCENTAGE: f64 = 10.0;

/// Maximum share of a default an endorser may take on, in percent
pub const MAX_ENDORSEMENT_PERCENTAGE: f64 = 30.0;

/// Endorsement model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Endorsement {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub endorser_id: String, // wallet address
    pub borrower_id: String,
    pub percentage: f64, // share of the defaulted amount, in [10, 30]
    pub signature: String,
    pub is_valid: bool,
    pub is_processed: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Endorsement {
    /// The message the endorser signs. Verification recomputes this exact
    /// string, so the format is part of the wire contract.
    pub fn canonical_message(&self) -> String {
        canonical_message(self.loan_id)
    }
}

/// `"endorsement for loan {loan_id}"`
pub fn canonical_message(loan_id: Uuid) -> String {
    format!("endorsement for loan {}", loan_id)
}

/// Request DTO for creating an endorsement
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EndorseRequest {
    pub loan_id: Uuid,
    #[validate(length(min = 1))]
    pub endorser_id: String,
    #[validate(range(min = 10.0, max = 30.0))]
    pub percentage: f64,
    #[validate(length(min = 1))]
    pub signature: String,
}

impl EndorseRequest {
    /// Build the persistent record. Percentage bounds were already checked
    /// by `validate()`; the repository re-checks them on write.
    pub fn into_endorsement(self, borrower_id: &str) -> Endorsement {
        Endorsement {
            id: Uuid::new_v4(),
            loan_id: self.loan_id,
            endorser_id: self.endorser_id,
            borrower_id: borrower_id.to_string(),
            percentage: self.percentage,
            signature: self.signature,
            is_valid: false,
            is_processed: false,
            version: 1,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of applying risk sharing to a single endorsement
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RiskShareOutcome {
    pub endorsement_id: Uuid,
    pub endorser_id: String,
    pub amount_deducted: f64,
    pub status: RiskShareStatus,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskShareStatus {
    Applied,
    /// The stake debit message could not be confirmed; the deduction is
    /// recorded and reconciliation will re-send it.
    DebitPending,
}
