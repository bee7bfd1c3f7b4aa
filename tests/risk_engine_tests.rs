//! Credit Scoring and Risk Math Tests
//!
//! These tests validate the scoring logic and the loan risk arithmetic
//! with boundary cases, tier classification, and score simulations.

use crosslend_server::loan::{
    health_factor, Loan, LoanStatus, LIQUIDATION_THRESHOLD, LTV_RATIO, RECOVERY_RATE,
    WARNING_THRESHOLD,
};
use crosslend_server::services::credit_scoring::{self, CreditProfile, CreditTier};

// ============================================================================
// Credit Tier Classification Tests
// ============================================================================

#[test]
fn test_credit_tier_excellent() {
    assert_eq!(CreditTier::from_score(850), CreditTier::Excellent);
    assert_eq!(CreditTier::from_score(820), CreditTier::Excellent);
    assert_eq!(CreditTier::from_score(800), CreditTier::Excellent);
}

#[test]
fn test_credit_tier_good() {
    assert_eq!(CreditTier::from_score(799), CreditTier::Good);
    assert_eq!(CreditTier::from_score(770), CreditTier::Good);
    assert_eq!(CreditTier::from_score(740), CreditTier::Good);
}

#[test]
fn test_credit_tier_fair() {
    assert_eq!(CreditTier::from_score(739), CreditTier::Fair);
    assert_eq!(CreditTier::from_score(700), CreditTier::Fair);
    assert_eq!(CreditTier::from_score(670), CreditTier::Fair);
}

#[test]
fn test_credit_tier_poor() {
    assert_eq!(CreditTier::from_score(669), CreditTier::Poor);
    assert_eq!(CreditTier::from_score(600), CreditTier::Poor);
    assert_eq!(CreditTier::from_score(580), CreditTier::Poor);
}

#[test]
fn test_credit_tier_high_risk() {
    assert_eq!(CreditTier::from_score(579), CreditTier::HighRisk);
    assert_eq!(CreditTier::from_score(400), CreditTier::HighRisk);
    assert_eq!(CreditTier::from_score(300), CreditTier::HighRisk);
}

#[test]
fn test_tier_rates_increase_with_risk() {
    let rates = [
        CreditTier::Excellent.annual_rate(),
        CreditTier::Good.annual_rate(),
        CreditTier::Fair.annual_rate(),
        CreditTier::Poor.annual_rate(),
        CreditTier::HighRisk.annual_rate(),
    ];

    for pair in rates.windows(2) {
        assert!(
            pair[0] < pair[1],
            "Rates must increase as the tier worsens: {:?}",
            rates
        );
    }
}

// ============================================================================
// Scoring Boundary Tests
// ============================================================================

fn profile(
    repayment_rate: f64,
    collateral_volatility: f64,
    endorsement_count: u32,
    chains_used: u32,
) -> CreditProfile {
    CreditProfile {
        repayment_rate,
        collateral_volatility,
        endorsement_count,
        chains_used,
    }
}

#[test]
fn test_score_empty_profile_gets_base() {
    let result = credit_scoring::score(&profile(0.0, 1.0, 0, 1));
    assert_eq!(result.score, 600, "No factor should fire, base score only");
}

#[test]
fn test_score_perfect_profile_clamps_to_max() {
    // 600 + 170 + 110 + 90 + 55 exceeds the cap
    let result = credit_scoring::score(&profile(1.0, 0.02, 5, 4));
    assert_eq!(result.score, 850);
}

#[test]
fn test_score_new_borrower_lands_in_poor_tier() {
    // Defaulted repayment rate 0.80 with unknown collateral volatility
    let result = credit_scoring::score(&profile(0.80, 0.35, 0, 1));
    assert_eq!(result.score, 655);
    assert_eq!(CreditTier::from_score(result.score), CreditTier::Poor);
}

#[test]
fn test_repayment_rate_thresholds() {
    let high = credit_scoring::score(&profile(0.95, 1.0, 0, 1)).score;
    let good = credit_scoring::score(&profile(0.949, 1.0, 0, 1)).score;
    let average = credit_scoring::score(&profile(0.75, 1.0, 0, 1)).score;
    let none = credit_scoring::score(&profile(0.749, 1.0, 0, 1)).score;

    assert_eq!(high, 770, "0.95 earns the high repayment bonus");
    assert_eq!(good, 710, "just below 0.95 drops to the good bonus");
    assert_eq!(average, 655, "0.75 earns the average bonus");
    assert_eq!(none, 600, "below 0.75 earns nothing");
}

#[test]
fn test_volatility_thresholds() {
    let low = credit_scoring::score(&profile(0.0, 0.10, 0, 1)).score;
    let moderate = credit_scoring::score(&profile(0.0, 0.25, 0, 1)).score;
    let none = credit_scoring::score(&profile(0.0, 0.26, 0, 1)).score;

    assert_eq!(low, 710);
    assert_eq!(moderate, 677);
    assert_eq!(none, 600);
}

#[test]
fn test_endorsement_thresholds() {
    let multiple = credit_scoring::score(&profile(0.0, 1.0, 3, 1)).score;
    let some = credit_scoring::score(&profile(0.0, 1.0, 1, 1)).score;
    let none = credit_scoring::score(&profile(0.0, 1.0, 0, 1)).score;

    assert_eq!(multiple, 690);
    assert_eq!(some, 645);
    assert_eq!(none, 600);
}

#[test]
fn test_chain_usage_thresholds() {
    let diversified = credit_scoring::score(&profile(0.0, 1.0, 0, 3)).score;
    let moderate = credit_scoring::score(&profile(0.0, 1.0, 0, 2)).score;
    let single = credit_scoring::score(&profile(0.0, 1.0, 0, 1)).score;

    assert_eq!(diversified, 655);
    assert_eq!(moderate, 628);
    assert_eq!(single, 600);
}

#[test]
fn test_score_stays_in_bounds() {
    let profiles = [
        profile(0.0, 1.0, 0, 0),
        profile(1.0, 0.0, 100, 100),
        profile(0.5, 0.5, 2, 2),
        profile(0.87, 0.12, 1, 3),
    ];

    for p in &profiles {
        let s = credit_scoring::score(p).score;
        assert!(
            (300..=850).contains(&s),
            "Score {} out of bounds for {:?}",
            s,
            p
        );
    }
}

#[test]
fn test_explanation_names_credited_factors() {
    let result = credit_scoring::score(&profile(0.96, 0.05, 3, 3));

    assert!(result.explanation.starts_with(&format!(
        "Your score is {} - Base credit score of 600",
        result.score
    )));
    assert!(result.explanation.contains("high repayment rate (40%)"));
    assert!(result.explanation.contains("low collateral volatility (30%)"));
    assert!(result.explanation.contains("multiple endorsers (20%)"));
    assert!(result.explanation.contains("diversified chain usage (10%)"));
}

#[test]
fn test_explanation_omits_uncredited_factors() {
    let result = credit_scoring::score(&profile(0.5, 1.0, 0, 1));
    assert!(!result.explanation.contains("repayment rate (40%)"));
    assert!(!result.explanation.contains("volatility (30%)"));
}

// ============================================================================
// Health Factor Tests
// ============================================================================

#[test]
fn test_health_factor_applies_ltv() {
    // 2000 collateral backing 1000 borrowed at 80% LTV
    let hf = health_factor(2000.0, 1000.0);
    assert!((hf - 1.6).abs() < 1e-9);
}

#[test]
fn test_health_factor_zero_principal_is_infinite() {
    assert_eq!(health_factor(2000.0, 0.0), f64::INFINITY);
    assert_eq!(health_factor(2000.0, -1.0), f64::INFINITY);
}

#[test]
fn test_health_factor_worthless_collateral_is_zero() {
    assert_eq!(health_factor(0.0, 1000.0), 0.0);
}

#[test]
fn test_liquidation_boundary_is_exclusive() {
    // Collateral of principal / LTV puts the factor exactly at 1.0,
    // which warns but must not liquidate.
    let at_threshold = health_factor(1000.0 / LTV_RATIO, 1000.0);
    assert!((at_threshold - LIQUIDATION_THRESHOLD).abs() < 1e-9);
    assert!(!(at_threshold < LIQUIDATION_THRESHOLD));

    let below = health_factor(1000.0 / LTV_RATIO - 1.0, 1000.0);
    assert!(below < LIQUIDATION_THRESHOLD);
}

#[test]
fn test_warning_band_sits_above_liquidation() {
    assert!(WARNING_THRESHOLD > LIQUIDATION_THRESHOLD);

    // 1750 collateral on 1000 borrowed gives 1.4, inside the warning band
    let hf = health_factor(1750.0, 1000.0);
    assert!(hf >= LIQUIDATION_THRESHOLD && hf < WARNING_THRESHOLD);
}

// ============================================================================
// Interest and Recovery Arithmetic Tests
// ============================================================================

fn sample_loan(principal: f64, interest_rate: f64, term_days: i32) -> Loan {
    use sqlx::types::chrono::Utc;
    use uuid::Uuid;

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
        interest_rate,
        status: LoanStatus::Active,
        version: 1,
        due_at: now + chrono::Duration::days(term_days as i64),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_simple_interest_full_year() {
    let loan = sample_loan(1000.0, 5.0, 365);
    assert!((loan.calculate_interest() - 50.0).abs() < 1e-9);
    assert!((loan.total_repayment() - 1050.0).abs() < 1e-9);
}

#[test]
fn test_simple_interest_scales_with_term() {
    let half_year = sample_loan(1000.0, 5.0, 182);
    let two_years = sample_loan(1000.0, 5.0, 730);

    assert!((half_year.calculate_interest() - 1000.0 * 0.05 * (182.0 / 365.0)).abs() < 1e-9);
    assert!((two_years.calculate_interest() - 100.0).abs() < 1e-9);
}

#[test]
fn test_recovery_leaves_a_shortfall() {
    let principal = 1000.0;
    let recovered = principal * RECOVERY_RATE;
    let shortfall = (principal - recovered).max(0.0);

    assert!((recovered - 950.0).abs() < 1e-9);
    assert!((shortfall - 50.0).abs() < 1e-9);
}

#[test]
fn test_endorser_shares_never_exceed_shortfall() {
    // Three endorsers at the 30% cap cover at most 90% of the shortfall
    let shortfall = 50.0;
    let percentages = [30.0, 30.0, 30.0];

    let total: f64 = percentages.iter().map(|p| p / 100.0 * shortfall).sum();
    assert!(total <= shortfall, "Combined shares {} exceed {}", total, shortfall);
}

// ============================================================================
// State Machine Tests
// ============================================================================

#[test]
fn test_lifecycle_happy_path_transitions() {
    assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Approved));
    assert!(LoanStatus::Approved.can_transition_to(LoanStatus::Active));
    assert!(LoanStatus::Active.can_transition_to(LoanStatus::Repaid));
    assert!(LoanStatus::Active.can_transition_to(LoanStatus::Liquidated));
    assert!(LoanStatus::Active.can_transition_to(LoanStatus::Defaulted));
    assert!(LoanStatus::Defaulted.can_transition_to(LoanStatus::Liquidated));
}

#[test]
fn test_terminal_states_admit_nothing() {
    for terminal in [LoanStatus::Repaid, LoanStatus::Liquidated] {
        for next in [
            LoanStatus::Pending,
            LoanStatus::Approved,
            LoanStatus::Active,
            LoanStatus::Repaid,
            LoanStatus::Defaulted,
            LoanStatus::Liquidated,
        ] {
            assert!(
                !terminal.can_transition_to(next),
                "{} -> {} must be rejected",
                terminal.as_str(),
                next.as_str()
            );
        }
    }
}

#[test]
fn test_defaulted_is_not_terminal() {
    assert!(!LoanStatus::Defaulted.is_terminal());
    assert!(!LoanStatus::Defaulted.can_transition_to(LoanStatus::Active));
    assert!(!LoanStatus::Defaulted.can_transition_to(LoanStatus::Repaid));
}

#[test]
fn test_no_shortcuts_into_active() {
    assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Active));
    assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Repaid));
    assert!(!LoanStatus::Approved.can_transition_to(LoanStatus::Repaid));
}
