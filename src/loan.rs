//! Loan models for CrossLend
//!
//! The loan state machine and the financial math live here; the lifecycle
//! engine in `loan_service` drives transitions through these types.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Loan-to-value ratio applied to collateral when computing health
pub const LTV_RATIO: f64 = 0.8;

/// Origination gate: collateral value must exceed principal by this factor
pub const ORIGINATION_COVERAGE: f64 = 1.2;

/// Fraction of principal recovered in a liquidation sale (5% penalty/slippage)
pub const RECOVERY_RATE: f64 = 0.95;

/// Health factor below which a loan is liquidatable
pub const LIQUIDATION_THRESHOLD: f64 = 1.0;

/// Upper bound of the warning band; [1.0, 1.5) warns but does not liquidate
pub const WARNING_THRESHOLD: f64 = 1.5;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Repaid,
    Defaulted,
    Liquidated,
}

impl LoanStatus {
    /// Whether no further transitions are possible from this state.
    ///
    /// `defaulted` is not terminal: it still admits the settlement
    /// transition to `liquidated`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Repaid | LoanStatus::Liquidated)
    }

    /// The transition table. Any pair not listed here is invalid.
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Approved, Active)
                | (Active, Repaid)
                | (Active, Defaulted)
                | (Active, Liquidated)
                | (Defaulted, Liquidated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Repaid => "repaid",
            LoanStatus::Defaulted => "defaulted",
            LoanStatus::Liquidated => "liquidated",
        }
    }
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub borrower_id: String, // wallet address
    pub collateral_asset: String,
    pub collateral_chain: String,
    pub borrow_asset: String,
    pub borrow_chain: String,
    pub collateral_amount: f64,
    pub principal: f64, // USD-denominated borrow amount
    pub term_days: i32,
    pub interest_rate: f64, // annual percent
    pub status: LoanStatus,
    pub version: i64, // bumped on every status write
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Simple interest over the loan term: principal x (rate/100) x (days/365)
    pub fn calculate_interest(&self) -> f64 {
        self.principal * (self.interest_rate / 100.0) * (self.term_days as f64 / 365.0)
    }

    /// Principal plus accrued simple interest
    pub fn total_repayment(&self) -> f64 {
        self.principal + self.calculate_interest()
    }

    /// Health factor at the given collateral valuation.
    ///
    /// Infinite when nothing is borrowed, zero when the collateral is
    /// worthless against a positive principal. Never cached.
    pub fn health_factor(&self, collateral_value_usd: f64) -> f64 {
        health_factor(collateral_value_usd, self.principal)
    }
}

/// `(collateral_value_usd x LTV_RATIO) / borrowed_value`
pub fn health_factor(collateral_value_usd: f64, borrowed_value: f64) -> f64 {
    if borrowed_value <= 0.0 {
        return f64::INFINITY;
    }
    (collateral_value_usd * LTV_RATIO) / borrowed_value
}

/// Structured loan request: the already-parsed input to the risk engine
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LoanRequest {
    #[validate(length(min = 1))]
    pub borrower_id: String,
    #[validate(length(min = 1))]
    pub collateral_asset: String,
    #[validate(length(min = 1))]
    pub collateral_chain: String,
    #[validate(range(exclusive_min = 0.0))]
    pub collateral_amount: f64,
    #[validate(length(min = 1))]
    pub borrow_asset: String,
    #[validate(length(min = 1))]
    pub borrow_chain: String,
    #[validate(range(exclusive_min = 0.0))]
    pub amount: f64,
    #[validate(range(min = 1))]
    pub term_days: i32,
    pub chain_preference: Option<String>,
    pub risk_tolerance: Option<String>,
}

/// Read model combining a loan with its computed financial figures
#[derive(Debug, Serialize)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub interest: f64,
    pub total_repayment: f64,
    pub health_factor: f64,
    pub collateral_value_usd: f64,
}

/// Query for listing loans
#[derive(Debug, Deserialize, Default)]
pub struct ListLoansQuery {
    pub borrower_id: Option<String>,
    pub status: Option<LoanStatus>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use LoanStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Active));
        assert!(Active.can_transition_to(Repaid));
        assert!(Active.can_transition_to(Defaulted));
        assert!(Active.can_transition_to(Liquidated));
        assert!(Defaulted.can_transition_to(Liquidated));

        // Disbursement cannot skip approval
        assert!(!Pending.can_transition_to(Active));
        // Terminal states admit nothing
        assert!(!Repaid.can_transition_to(Active));
        assert!(!Liquidated.can_transition_to(Active));
        assert!(!Liquidated.can_transition_to(Repaid));
        // Defaulted only settles, never revives
        assert!(!Defaulted.can_transition_to(Active));
        assert!(!Defaulted.can_transition_to(Repaid));
    }

    #[test]
    fn test_terminality() {
        assert!(LoanStatus::Repaid.is_terminal());
        assert!(LoanStatus::Liquidated.is_terminal());
        assert!(!LoanStatus::Defaulted.is_terminal());
        assert!(!LoanStatus::Active.is_terminal());
    }

    #[test]
    fn test_health_factor() {
        // 1500 collateral against 1000 borrowed at 0.8 LTV = 1.2
        let hf = health_factor(1500.0, 1000.0);
        assert!((hf - 1.2).abs() < 1e-9);

        // Nothing borrowed means infinite health
        assert_eq!(health_factor(1500.0, 0.0), f64::INFINITY);

        // Worthless collateral against positive principal
        assert_eq!(health_factor(0.0, 1000.0), 0.0);
    }

    #[test]
    fn test_simple_interest() {
        let loan = sample_loan(1000.0, 5.5, 365);
        assert!((loan.calculate_interest() - 55.0).abs() < 1e-9);
        assert!((loan.total_repayment() - 1055.0).abs() < 1e-9);

        // Half a year accrues half the interest
        let loan = sample_loan(1000.0, 5.5, 182);
        let expected = 1000.0 * 0.055 * (182.0 / 365.0);
        assert!((loan.calculate_interest() - expected).abs() < 1e-9);
    }

    fn sample_loan(principal: f64, rate: f64, term_days: i32) -> Loan {
        let now = Utc::now();
        Loan {
            id: Uuid::new_v4(),
            borrower_id: "0xborrower".to_string(),
            collateral_asset: "ETH".to_string(),
            collateral_chain: "ethereum".to_string(),
            borrow_asset: "USDC".to_string(),
            borrow_chain: "base".to_string(),
            collateral_amount: 1.0,
            principal,
            term_days,
            interest_rate: rate,
            status: LoanStatus::Active,
            version: 1,
            due_at: now + chrono::Duration::days(term_days as i64),
            created_at: now,
            updated_at: now,
        }
    }
}
