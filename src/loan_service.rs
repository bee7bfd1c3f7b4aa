//! Loan lifecycle engine - the state machine and financial math
//!
//! Every transition goes through the repository's compare-and-swap write, so
//! two concurrent drivers of the same loan cannot both win; the loser sees
//! `ConcurrentModification` and must re-read. State is unchanged on any
//! failure. Mutating a terminal loan is an internal invariant violation, not
//! a user-facing error.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::error::{LendingError, LendingResult};
use crate::loan::{Loan, LoanRequest, LoanStatus, ORIGINATION_COVERAGE, RECOVERY_RATE};
use crate::repository::LoanRepository;

/// Result of a repayment that settled a loan
#[derive(Debug, Clone)]
pub struct RepaymentOutcome {
    pub loan: Loan,
    pub amount_paid: f64,
    /// `max(0, principal - amount)`, informational: the loan is settled
    pub remaining_balance: f64,
}

/// Result of a liquidation
#[derive(Debug, Clone)]
pub struct LiquidationOutcome {
    pub loan: Loan,
    /// Proceeds of the collateral sale after penalty and slippage
    pub amount_recovered: f64,
}

/// Drives loans through `pending -> approved -> active -> {repaid |
/// defaulted | liquidated}`, with `defaulted -> liquidated` as the only
/// way out of default.
pub struct LoanLifecycleEngine {
    repository: Arc<dyn LoanRepository>,
}

impl LoanLifecycleEngine {
    pub fn new(repository: Arc<dyn LoanRepository>) -> Self {
        Self { repository }
    }

    /// Record a new loan in `pending`. The interest rate is chosen by the
    /// caller (the risk engine maps the credit tier to a rate).
    pub async fn create_loan(
        &self,
        request: &LoanRequest,
        interest_rate: f64,
    ) -> LendingResult<Loan> {
        request.validate()?;

        let now = Utc::now();
        let loan = Loan {
            id: Uuid::new_v4(),
            borrower_id: request.borrower_id.clone(),
            collateral_asset: request.collateral_asset.clone(),
            collateral_chain: request.collateral_chain.clone(),
            borrow_asset: request.borrow_asset.clone(),
            borrow_chain: request.borrow_chain.clone(),
            collateral_amount: request.collateral_amount,
            principal: request.amount,
            term_days: request.term_days,
            interest_rate,
            status: LoanStatus::Pending,
            version: 1,
            due_at: now + Duration::days(request.term_days as i64),
            created_at: now,
            updated_at: now,
        };

        self.repository.insert_loan(&loan).await?;

        tracing::info!(
            loan_id = %loan.id,
            borrower = %loan.borrower_id,
            principal = loan.principal,
            interest_rate = loan.interest_rate,
            "Loan created"
        );

        Ok(loan)
    }

    pub async fn get_loan(&self, id: Uuid) -> LendingResult<Loan> {
        self.repository
            .get_loan(id)
            .await?
            .ok_or_else(|| LendingError::NotFound(format!("loan {}", id)))
    }

    /// Origination gate: the collateral's USD value must exceed the
    /// principal by the coverage factor. On success the loan moves to
    /// `approved`; on rejection it stays `pending` untouched.
    pub async fn evaluate(&self, loan: &Loan, collateral_value_usd: f64) -> LendingResult<Loan> {
        let required = loan.principal * ORIGINATION_COVERAGE;
        if collateral_value_usd <= required {
            tracing::warn!(
                loan_id = %loan.id,
                collateral_value = collateral_value_usd,
                required = required,
                "Loan rejected, collateral below origination coverage"
            );
            return Err(LendingError::InsufficientCollateral {
                collateral_value: collateral_value_usd,
                required,
            });
        }

        let approved = self.transition(loan, LoanStatus::Approved).await?;
        tracing::info!(
            loan_id = %approved.id,
            collateral_value = collateral_value_usd,
            "Loan approved"
        );
        Ok(approved)
    }

    /// Activate a loan once the disbursement has been confirmed on the
    /// target chain. Callers must not invoke this on an unconfirmed send.
    pub async fn disburse(&self, loan: &Loan) -> LendingResult<Loan> {
        let active = self.transition(loan, LoanStatus::Active).await?;
        tracing::info!(loan_id = %active.id, "Loan active, funds disbursed");
        Ok(active)
    }

    /// Settle a loan with a repayment. Any accepted repayment settles the
    /// loan in full; the remaining-balance figure is informational.
    pub async fn repay(&self, loan: &Loan, amount: f64) -> LendingResult<RepaymentOutcome> {
        if !(amount > 0.0) {
            return Err(LendingError::InvalidAmount(amount));
        }

        let repaid = self.transition(loan, LoanStatus::Repaid).await?;
        let remaining_balance = (repaid.principal - amount).max(0.0);

        tracing::info!(
            loan_id = %repaid.id,
            amount = amount,
            remaining_balance = remaining_balance,
            "Loan repaid"
        );

        Ok(RepaymentOutcome {
            loan: repaid,
            amount_paid: amount,
            remaining_balance,
        })
    }

    /// Liquidate an `active` or `defaulted` loan. The recovery is a fixed
    /// fraction of principal; the shortfall is the risk engine's problem.
    pub async fn trigger_liquidation(&self, loan: &Loan) -> LendingResult<LiquidationOutcome> {
        let liquidated = self.transition(loan, LoanStatus::Liquidated).await?;
        let amount_recovered = liquidated.principal * RECOVERY_RATE;

        tracing::warn!(
            loan_id = %liquidated.id,
            amount_recovered = amount_recovered,
            "Loan liquidated"
        );

        Ok(LiquidationOutcome {
            loan: liquidated,
            amount_recovered,
        })
    }

    /// Move a past-due `active` loan to `defaulted`.
    pub async fn mark_defaulted(&self, loan: &Loan) -> LendingResult<Loan> {
        if Utc::now() < loan.due_at {
            return Err(LendingError::Validation(format!(
                "loan {} is not past due",
                loan.id
            )));
        }

        let defaulted = self.transition(loan, LoanStatus::Defaulted).await?;
        tracing::warn!(loan_id = %defaulted.id, due_at = %defaulted.due_at, "Loan defaulted");
        Ok(defaulted)
    }

    /// Sweep all active loans and default the past-due ones. Returns the
    /// ids that moved. A loan that races another writer is skipped, it
    /// will be picked up on the next sweep.
    pub async fn detect_defaults(&self) -> LendingResult<Vec<Uuid>> {
        let now = Utc::now();
        let active = self.repository.list_by_status(LoanStatus::Active).await?;

        let mut defaulted = Vec::new();
        for loan in active.iter().filter(|l| l.due_at < now) {
            match self.transition(loan, LoanStatus::Defaulted).await {
                Ok(moved) => defaulted.push(moved.id),
                Err(LendingError::ConcurrentModification) => {
                    tracing::debug!(loan_id = %loan.id, "Default sweep lost a race, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        if !defaulted.is_empty() {
            tracing::warn!(count = defaulted.len(), "Defaulted past-due loans");
        }
        Ok(defaulted)
    }

    async fn transition(&self, loan: &Loan, next: LoanStatus) -> LendingResult<Loan> {
        // A terminal loan reaching this point means a caller bug, not bad input
        debug_assert!(
            !loan.status.is_terminal(),
            "transition attempted out of terminal state {}",
            loan.status.as_str()
        );
        self.repository
            .update_status(loan.id, loan.version, next)
            .await
    }
}
