//! Endorsement manager - validation and risk sharing
//!
//! Validation delegates to the signature verifier over the canonical
//! message. Risk sharing is at-most-once per endorsement: the processed
//! flag is flipped through a repository CAS before any amount is reported,
//! so repeated invocation cannot double-debit an endorser.

use std::sync::Arc;

use validator::Validate;

use crate::error::{LendingError, LendingResult};
use crate::repository::EndorsementRepository;
use crate::verifier::SignatureVerifier;

use super::model::{
    EndorseRequest, Endorsement, RiskShareOutcome, RiskShareStatus,
};

pub struct EndorsementManager {
    repository: Arc<dyn EndorsementRepository>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl EndorsementManager {
    pub fn new(
        repository: Arc<dyn EndorsementRepository>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            repository,
            verifier,
        }
    }

    /// Record a new endorsement and immediately validate its signature.
    pub async fn create_endorsement(
        &self,
        request: EndorseRequest,
        borrower_id: &str,
    ) -> LendingResult<Endorsement> {
        request.validate()?;

        let endorsement = request.into_endorsement(borrower_id);
        self.repository.insert_endorsement(&endorsement).await?;

        let is_valid = self.validate(&endorsement).await?;

        tracing::info!(
            endorsement_id = %endorsement.id,
            loan_id = %endorsement.loan_id,
            endorser = %endorsement.endorser_id,
            percentage = endorsement.percentage,
            is_valid = is_valid,
            "Endorsement recorded"
        );

        self.repository
            .get_endorsement(endorsement.id)
            .await?
            .ok_or_else(|| LendingError::NotFound(format!("endorsement {}", endorsement.id)))
    }

    /// Verify the endorser's signature over the canonical message and
    /// persist the result. A verifier infrastructure failure propagates as
    /// `Verification`; it never silently counts as valid.
    pub async fn validate(&self, endorsement: &Endorsement) -> LendingResult<bool> {
        let message = endorsement.canonical_message();
        let is_valid = self
            .verifier
            .verify(&endorsement.endorser_id, &message, &endorsement.signature)
            .await?;

        self.repository.set_valid(endorsement.id, is_valid).await?;

        if !is_valid {
            tracing::warn!(
                endorsement_id = %endorsement.id,
                endorser = %endorsement.endorser_id,
                "Endorsement signature did not verify"
            );
        }

        Ok(is_valid)
    }

    /// Compute this endorsement's share of a defaulted amount and mark it
    /// processed. The returned amount is what the caller must debit from
    /// the endorser's stake; the debit itself goes through the messenger.
    pub async fn apply_risk_sharing(
        &self,
        endorsement: &Endorsement,
        defaulted_amount: f64,
    ) -> LendingResult<RiskShareOutcome> {
        if !endorsement.is_valid {
            return Err(LendingError::InvalidEndorsement(endorsement.id));
        }

        // CAS first: a second caller loses here before any amount leaves
        let processed = self
            .repository
            .mark_processed(endorsement.id, endorsement.version)
            .await?;

        let amount_deducted = endorsement.percentage / 100.0 * defaulted_amount;

        tracing::info!(
            endorsement_id = %processed.id,
            loan_id = %processed.loan_id,
            endorser = %processed.endorser_id,
            amount_deducted = amount_deducted,
            "Risk sharing applied"
        );

        Ok(RiskShareOutcome {
            endorsement_id: processed.id,
            endorser_id: processed.endorser_id,
            amount_deducted,
            status: RiskShareStatus::Applied,
        })
    }
}
