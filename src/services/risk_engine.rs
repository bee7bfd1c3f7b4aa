//! Risk Engine for CrossLend
//!
//! The orchestrator: composes the lifecycle engine, credit scoring,
//! endorsement manager, price oracle and cross-chain messenger into the
//! user-facing loan operations. Local state always commits before remote
//! effects are trusted; a message whose outcome is unknown leaves the loan
//! in a pending-reconciliation shape rather than guessing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::endorsement::{EndorseRequest, Endorsement, EndorsementManager, RiskShareOutcome, RiskShareStatus};
use crate::error::{LendingError, LendingResult};
use crate::loan::{Loan, LoanDetails, LoanRequest, LoanStatus};
use crate::loan_service::LoanLifecycleEngine;
use crate::messenger::{CrossChainAction, CrossChainMessage, CrossChainMessenger, RetryPolicy};
use crate::oracle::PriceOracle;
use crate::repository::{EndorsementRepository, LoanRepository};

use super::credit_scoring::{self, CreditProfile, CreditScore, CreditTier};

/// Chain the lending pool lives on; disbursements originate here
pub const POOL_CHAIN: &str = "base";

// ============================================================================
// Result Types
// ============================================================================

/// Combined result of loan origination
#[derive(Debug, Serialize)]
pub struct LoanDecision {
    pub details: LoanDetails,
    pub credit_score: CreditScore,
    pub tier: CreditTier,
    /// Gateway transaction id of the disbursement, absent when the loan
    /// was already active before this call
    pub disbursement_tx: Option<String>,
}

/// Whether the collateral made it back to the borrower
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "state", content = "tx_id")]
pub enum CollateralRelease {
    Released(String),
    /// The unlock could not be confirmed. The loan stays repaid;
    /// reconciliation re-sends with the same idempotency key.
    Pending,
}

/// Result of settling a loan
#[derive(Debug, Serialize)]
pub struct RepaymentResult {
    pub loan: Loan,
    pub amount_paid_usd: f64,
    pub remaining_balance: f64,
    pub collateral_release: CollateralRelease,
}

/// Result of liquidating a loan
#[derive(Debug, Serialize)]
pub struct LiquidationResult {
    pub loan: Loan,
    pub amount_recovered: f64,
    /// Principal not covered by the collateral sale
    pub shortfall: f64,
    /// Gateway transaction id of the settlement, absent when unconfirmed
    pub settlement_tx: Option<String>,
    pub risk_shares: Vec<RiskShareOutcome>,
}

/// Credit assessment read model
#[derive(Debug, Serialize)]
pub struct CreditAssessment {
    pub borrower_id: String,
    pub credit_score: CreditScore,
    pub tier: CreditTier,
    pub annual_rate: f64,
}

/// Volatility assumed for a collateral asset when building a credit profile
fn asset_volatility(asset: &str) -> f64 {
    match asset {
        "USDC" | "DAI" => 0.02,
        "BTC" => 0.12,
        "ETH" => 0.15,
        "SOL" => 0.25,
        _ => 0.35,
    }
}

// ============================================================================
// Risk Engine
// ============================================================================

pub struct RiskEngine {
    lifecycle: LoanLifecycleEngine,
    endorsements: EndorsementManager,
    loans: Arc<dyn LoanRepository>,
    endorsement_store: Arc<dyn EndorsementRepository>,
    oracle: Arc<dyn PriceOracle>,
    messenger: Arc<dyn CrossChainMessenger>,
    retry: RetryPolicy,
}

impl RiskEngine {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        endorsement_store: Arc<dyn EndorsementRepository>,
        endorsements: EndorsementManager,
        oracle: Arc<dyn PriceOracle>,
        messenger: Arc<dyn CrossChainMessenger>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            lifecycle: LoanLifecycleEngine::new(loans.clone()),
            endorsements,
            loans,
            endorsement_store,
            oracle,
            messenger,
            retry,
        }
    }

    /// Originate a loan end to end: price the collateral, score the
    /// borrower, gate on coverage, then drive the lock-and-mint and
    /// disbursement messages. A messenger failure after approval leaves
    /// the loan `approved` and surfaces `DisbursementPending`; call
    /// `resume_disbursement` to retry with the same idempotency keys.
    pub async fn initiate_loan(&self, request: &LoanRequest) -> LendingResult<LoanDecision> {
        request.validate()?;

        let price = self.oracle.get_price(&request.collateral_asset).await?;
        let collateral_value = price * request.collateral_amount;

        let assessment = self.credit_score(&request.borrower_id).await?;
        let loan = self
            .lifecycle
            .create_loan(request, assessment.annual_rate)
            .await?;
        let loan = self.lifecycle.evaluate(&loan, collateral_value).await?;

        let receipt = match self.drive_disbursement(&loan, request.chain_preference.as_deref()).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(
                    loan_id = %loan.id,
                    error = %err,
                    "Disbursement unconfirmed, loan parked as approved"
                );
                return Err(LendingError::DisbursementPending(loan.id));
            }
        };

        let loan = self.lifecycle.disburse(&loan).await?;

        Ok(LoanDecision {
            details: self.details_for(loan, collateral_value),
            credit_score: assessment.credit_score,
            tier: assessment.tier,
            disbursement_tx: Some(receipt),
        })
    }

    /// Retry the messenger leg of origination. Idempotent: the gateway
    /// deduplicates by key, and an already-active loan returns without
    /// re-sending. Collateral is not re-evaluated.
    pub async fn resume_disbursement(&self, loan_id: Uuid) -> LendingResult<LoanDecision> {
        let loan = self.lifecycle.get_loan(loan_id).await?;
        let assessment = self.credit_score(&loan.borrower_id).await?;

        match loan.status {
            LoanStatus::Active => {
                let price = self.oracle.get_price(&loan.collateral_asset).await?;
                let collateral_value = price * loan.collateral_amount;
                Ok(LoanDecision {
                    details: self.details_for(loan, collateral_value),
                    credit_score: assessment.credit_score,
                    tier: assessment.tier,
                    disbursement_tx: None,
                })
            }
            LoanStatus::Approved => {
                let receipt = self
                    .drive_disbursement(&loan, None)
                    .await
                    .map_err(|err| {
                        tracing::warn!(loan_id = %loan.id, error = %err, "Disbursement retry unconfirmed");
                        LendingError::DisbursementPending(loan.id)
                    })?;
                let loan = self.lifecycle.disburse(&loan).await?;

                let price = self.oracle.get_price(&loan.collateral_asset).await?;
                let collateral_value = price * loan.collateral_amount;
                Ok(LoanDecision {
                    details: self.details_for(loan, collateral_value),
                    credit_score: assessment.credit_score,
                    tier: assessment.tier,
                    disbursement_tx: Some(receipt),
                })
            }
            other => Err(LendingError::InvalidTransition {
                from: other.as_str().to_string(),
                to: LoanStatus::Active.as_str().to_string(),
            }),
        }
    }

    /// Settle a loan with a repayment, converting the repayment asset to
    /// USD at oracle rates. Once `repaid` has committed, an unconfirmed
    /// collateral unlock is reported as `Pending` and never reverts it.
    pub async fn repay_loan(
        &self,
        loan_id: Uuid,
        amount: f64,
        asset: &str,
    ) -> LendingResult<RepaymentResult> {
        let loan = self.lifecycle.get_loan(loan_id).await?;

        let price = self.oracle.get_price(asset).await?;
        if price <= 0.0 {
            return Err(LendingError::Validation(format!(
                "repayment asset {} cannot be valued",
                asset
            )));
        }
        let amount_usd = amount * price;

        let outcome = self.lifecycle.repay(&loan, amount_usd).await?;

        let message = CrossChainMessage::new(
            loan.id,
            &loan.borrow_chain,
            &loan.collateral_chain,
            CrossChainAction::BurnAndUnlock,
            serde_json::json!({
                "asset": loan.collateral_asset,
                "amount": loan.collateral_amount,
                "to": loan.borrower_id,
            }),
        );

        let collateral_release = match self.retry.send_with_retry(self.messenger.as_ref(), &message).await {
            Ok(receipt) => CollateralRelease::Released(receipt.transaction_id),
            Err(err) => {
                tracing::warn!(
                    loan_id = %loan.id,
                    error = %err,
                    "Collateral unlock unconfirmed, parked for reconciliation"
                );
                CollateralRelease::Pending
            }
        };

        Ok(RepaymentResult {
            loan: outcome.loan,
            amount_paid_usd: outcome.amount_paid,
            remaining_balance: outcome.remaining_balance,
            collateral_release,
        })
    }

    /// Liquidate a loan and distribute the shortfall to its endorsers.
    ///
    /// The local liquidation commits first; only then are the settlement
    /// and the endorser stake debit sent. All endorser deductions go out
    /// in one batched debit message, so the total debited equals the sum
    /// of per-endorsement deductions and the message stays idempotent
    /// under its (loan, action) key.
    pub async fn liquidate_loan(&self, loan_id: Uuid) -> LendingResult<LiquidationResult> {
        let loan = self.lifecycle.get_loan(loan_id).await?;
        let outcome = self.lifecycle.trigger_liquidation(&loan).await?;
        let loan = outcome.loan;
        let shortfall = (loan.principal - outcome.amount_recovered).max(0.0);

        let settle = CrossChainMessage::new(
            loan.id,
            &loan.collateral_chain,
            &loan.borrow_chain,
            CrossChainAction::SettleLiquidation,
            serde_json::json!({
                "asset": loan.collateral_asset,
                "amount": loan.collateral_amount,
                "amount_recovered": outcome.amount_recovered,
            }),
        );
        let settlement_tx = match self.retry.send_with_retry(self.messenger.as_ref(), &settle).await {
            Ok(receipt) => Some(receipt.transaction_id),
            Err(err) => {
                tracing::warn!(
                    loan_id = %loan.id,
                    error = %err,
                    "Liquidation settlement unconfirmed, parked for reconciliation"
                );
                None
            }
        };

        let risk_shares = if shortfall > 0.0 {
            self.share_shortfall(&loan, shortfall).await?
        } else {
            Vec::new()
        };

        Ok(LiquidationResult {
            loan,
            amount_recovered: outcome.amount_recovered,
            shortfall,
            settlement_tx,
            risk_shares,
        })
    }

    /// Record a peer endorsement against a pending or active loan.
    pub async fn endorse_loan(&self, request: EndorseRequest) -> LendingResult<Endorsement> {
        let loan = self.lifecycle.get_loan(request.loan_id).await?;
        if loan.status.is_terminal() {
            return Err(LendingError::Validation(format!(
                "loan {} is already settled",
                loan.id
            )));
        }
        self.endorsements
            .create_endorsement(request, &loan.borrower_id)
            .await
    }

    /// Score a borrower from repository history. New borrowers with no
    /// completed loans get a neutral repayment rate rather than a perfect
    /// or zero one.
    pub async fn credit_score(&self, borrower_id: &str) -> LendingResult<CreditAssessment> {
        let loans = self.loans.list_by_borrower(borrower_id).await?;

        let repaid = loans
            .iter()
            .filter(|l| l.status == LoanStatus::Repaid)
            .count() as f64;
        let completed = loans
            .iter()
            .filter(|l| {
                matches!(
                    l.status,
                    LoanStatus::Repaid | LoanStatus::Defaulted | LoanStatus::Liquidated
                )
            })
            .count() as f64;
        let repayment_rate = if completed > 0.0 { repaid / completed } else { 0.80 };

        let collateral_volatility = if loans.is_empty() {
            0.35
        } else {
            loans
                .iter()
                .map(|l| asset_volatility(&l.collateral_asset))
                .sum::<f64>()
                / loans.len() as f64
        };

        let chains: HashSet<&str> = loans
            .iter()
            .flat_map(|l| [l.collateral_chain.as_str(), l.borrow_chain.as_str()])
            .collect();

        let endorsement_count = self
            .endorsement_store
            .count_valid_for_borrower(borrower_id)
            .await?;

        let profile = CreditProfile {
            repayment_rate,
            collateral_volatility,
            endorsement_count,
            chains_used: chains.len() as u32,
        };
        let credit_score = credit_scoring::score(&profile);
        let tier = CreditTier::from_score(credit_score.score);

        tracing::debug!(
            borrower = %borrower_id,
            score = credit_score.score,
            tier = ?tier,
            "Borrower scored"
        );

        Ok(CreditAssessment {
            borrower_id: borrower_id.to_string(),
            annual_rate: tier.annual_rate(),
            credit_score,
            tier,
        })
    }

    /// Read model with the health factor at current prices.
    pub async fn loan_details(&self, loan_id: Uuid) -> LendingResult<LoanDetails> {
        let loan = self.lifecycle.get_loan(loan_id).await?;
        let price = self.oracle.get_price(&loan.collateral_asset).await?;
        let collateral_value = price * loan.collateral_amount;
        Ok(self.details_for(loan, collateral_value))
    }

    pub fn lifecycle(&self) -> &LoanLifecycleEngine {
        &self.lifecycle
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Lock the collateral, then disburse from the pool to the borrower's
    /// preferred chain. Both messages carry stable idempotency keys, so a
    /// retry after an unknown outcome cannot double-execute.
    async fn drive_disbursement(
        &self,
        loan: &Loan,
        chain_preference: Option<&str>,
    ) -> LendingResult<String> {
        let lock = CrossChainMessage::new(
            loan.id,
            &loan.collateral_chain,
            POOL_CHAIN,
            CrossChainAction::LockAndMint,
            serde_json::json!({
                "asset": loan.collateral_asset,
                "amount": loan.collateral_amount,
            }),
        );
        self.retry.send_with_retry(self.messenger.as_ref(), &lock).await?;

        let target_chain = chain_preference.unwrap_or(&loan.borrow_chain);
        let disburse = CrossChainMessage::new(
            loan.id,
            POOL_CHAIN,
            target_chain,
            CrossChainAction::DisburseFunds,
            serde_json::json!({
                "asset": loan.borrow_asset,
                "amount": loan.principal,
                "to": loan.borrower_id,
            }),
        );
        let receipt = self
            .retry
            .send_with_retry(self.messenger.as_ref(), &disburse)
            .await?;
        Ok(receipt.transaction_id)
    }

    /// Apply risk sharing per valid endorsement, then debit every
    /// endorser's stake in a single batched message.
    async fn share_shortfall(
        &self,
        loan: &Loan,
        shortfall: f64,
    ) -> LendingResult<Vec<RiskShareOutcome>> {
        let endorsements = self.endorsement_store.list_by_loan(loan.id).await?;
        let mut outcomes = Vec::new();

        for endorsement in endorsements
            .iter()
            .filter(|e| e.is_valid && !e.is_processed)
        {
            // Stake lookup is advisory; the debit proceeds either way.
            let expected = endorsement.percentage / 100.0 * shortfall;
            match self.messenger.get_balances(&endorsement.endorser_id).await {
                Ok(balances) => {
                    let staked = balances.get(POOL_CHAIN).copied().unwrap_or(0.0);
                    if staked < expected {
                        tracing::warn!(
                            loan_id = %loan.id,
                            endorser_id = %endorsement.endorser_id,
                            staked = staked,
                            expected = expected,
                            "Endorser stake below expected deduction"
                        );
                    }
                }
                Err(err) => {
                    tracing::debug!(
                        endorser_id = %endorsement.endorser_id,
                        error = %err,
                        "Endorser stake lookup failed"
                    );
                }
            }

            let outcome = self
                .endorsements
                .apply_risk_sharing(endorsement, shortfall)
                .await?;
            outcomes.push(outcome);
        }

        if outcomes.is_empty() {
            return Ok(outcomes);
        }

        let total_deducted: f64 = outcomes.iter().map(|o| o.amount_deducted).sum();
        let debits: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|o| {
                serde_json::json!({
                    "endorser": o.endorser_id,
                    "amount": o.amount_deducted,
                })
            })
            .collect();

        let debit = CrossChainMessage::new(
            loan.id,
            POOL_CHAIN,
            POOL_CHAIN,
            CrossChainAction::BurnAndUnlock,
            serde_json::json!({
                "stake_debits": debits,
                "total_deducted": total_deducted,
            }),
        );

        if let Err(err) = self.retry.send_with_retry(self.messenger.as_ref(), &debit).await {
            tracing::warn!(
                loan_id = %loan.id,
                total_deducted = total_deducted,
                error = %err,
                "Endorser stake debit unconfirmed, parked for reconciliation"
            );
            for outcome in &mut outcomes {
                outcome.status = RiskShareStatus::DebitPending;
            }
        }

        Ok(outcomes)
    }

    fn details_for(&self, loan: Loan, collateral_value_usd: f64) -> LoanDetails {
        LoanDetails {
            interest: loan.calculate_interest(),
            total_repayment: loan.total_repayment(),
            health_factor: loan.health_factor(collateral_value_usd),
            collateral_value_usd,
            loan,
        }
    }
}
