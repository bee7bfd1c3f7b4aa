//! Credit Scoring Engine for CrossLend
//!
//! This module implements cross-chain credit scoring from behavioral
//! history. Scores are advisory only - they pick loan terms, while the
//! collateral gates enforce final rules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Starting score before any behavioral adjustments
pub const BASE_SCORE: i32 = 600;

/// Minimum credit score
pub const MIN_SCORE: i32 = 300;

/// Maximum credit score
pub const MAX_SCORE: i32 = 850;

// Bonus tiers. The four factors split the 550-point range above base at
// 40% / 30% / 20% / 10% weights.

/// Repayment rate bonuses (40% weight)
const REPAYMENT_HIGH_BONUS: i32 = 170;
const REPAYMENT_GOOD_BONUS: i32 = 110;
const REPAYMENT_AVERAGE_BONUS: i32 = 55;

/// Collateral volatility bonuses (30% weight)
const VOLATILITY_LOW_BONUS: i32 = 110;
const VOLATILITY_MODERATE_BONUS: i32 = 77;

/// Endorsement count bonuses (20% weight)
const ENDORSEMENT_MULTIPLE_BONUS: i32 = 90;
const ENDORSEMENT_SOME_BONUS: i32 = 45;

/// Multi-chain activity bonuses (10% weight)
const CHAINS_DIVERSIFIED_BONUS: i32 = 55;
const CHAINS_MODERATE_BONUS: i32 = 28;

// ============================================================================
// Data Models
// ============================================================================

/// Behavioral inputs to the scoring function. Derived from repository
/// history, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditProfile {
    /// Fraction of completed loans repaid, in [0, 1]
    pub repayment_rate: f64,
    /// Volatility of the borrower's usual collateral assets
    pub collateral_volatility: f64,
    /// Valid endorsements backing this borrower
    pub endorsement_count: u32,
    /// Distinct chains the borrower has transacted on
    pub chains_used: u32,
}

/// Scoring output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreditScore {
    /// Score in [300, 850]
    pub score: i32,
    /// Human-readable account of which factors were credited
    pub explanation: String,
}

/// Credit tier classification, used to pick interest terms
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreditTier {
    Excellent,
    Good,
    Fair,
    Poor,
    HighRisk,
}

impl CreditTier {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 800 => CreditTier::Excellent,
            s if s >= 740 => CreditTier::Good,
            s if s >= 670 => CreditTier::Fair,
            s if s >= 580 => CreditTier::Poor,
            _ => CreditTier::HighRisk,
        }
    }

    /// Annual interest rate offered to this tier, in percent
    pub fn annual_rate(&self) -> f64 {
        match self {
            CreditTier::Excellent => 4.5,
            CreditTier::Good => 5.0,
            CreditTier::Fair => 5.5,
            CreditTier::Poor => 6.5,
            CreditTier::HighRisk => 8.0,
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Score a behavioral profile. Pure function, no I/O.
pub fn score(profile: &CreditProfile) -> CreditScore {
    let mut score = BASE_SCORE;
    let mut explanation = format!("Base credit score of {}", BASE_SCORE);

    // Repayment rate (40% weight)
    if profile.repayment_rate >= 0.95 {
        score += REPAYMENT_HIGH_BONUS;
        explanation.push_str(", high repayment rate (40%)");
    } else if profile.repayment_rate >= 0.85 {
        score += REPAYMENT_GOOD_BONUS;
        explanation.push_str(", good repayment rate (40%)");
    } else if profile.repayment_rate >= 0.75 {
        score += REPAYMENT_AVERAGE_BONUS;
        explanation.push_str(", average repayment rate (40%)");
    }

    // Collateral volatility (30% weight)
    if profile.collateral_volatility <= 0.1 {
        score += VOLATILITY_LOW_BONUS;
        explanation.push_str(", low collateral volatility (30%)");
    } else if profile.collateral_volatility <= 0.25 {
        score += VOLATILITY_MODERATE_BONUS;
        explanation.push_str(", moderate collateral volatility (30%)");
    }

    // Social endorsements (20% weight)
    if profile.endorsement_count >= 3 {
        score += ENDORSEMENT_MULTIPLE_BONUS;
        explanation.push_str(", multiple endorsers (20%)");
    } else if profile.endorsement_count >= 1 {
        score += ENDORSEMENT_SOME_BONUS;
        explanation.push_str(", some endorsers (20%)");
    }

    // Multi-chain activity (10% weight)
    if profile.chains_used >= 3 {
        score += CHAINS_DIVERSIFIED_BONUS;
        explanation.push_str(", diversified chain usage (10%)");
    } else if profile.chains_used >= 2 {
        score += CHAINS_MODERATE_BONUS;
        explanation.push_str(", moderate chain usage (10%)");
    }

    let score = score.clamp(MIN_SCORE, MAX_SCORE);

    CreditScore {
        score,
        explanation: format!("Your score is {} - {}", score, explanation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_base_score_with_no_credits() {
        let result = score(&profile(0.0, 0.9, 0, 0));
        assert_eq!(result.score, 600);
        assert_eq!(
            result.explanation,
            "Your score is 600 - Base credit score of 600"
        );
    }

    #[test]
    fn test_maximal_profile_clamps_to_850() {
        // 600 + 170 + 110 + 90 + 55 = 1025, clamped
        let result = score(&profile(1.0, 0.05, 5, 4));
        assert_eq!(result.score, 850);
        assert!(result.explanation.contains("high repayment rate (40%)"));
        assert!(result
            .explanation
            .contains("low collateral volatility (30%)"));
        assert!(result.explanation.contains("multiple endorsers (20%)"));
        assert!(result.explanation.contains("diversified chain usage (10%)"));
    }

    #[test]
    fn test_tier_boundaries() {
        // Exactly at each threshold
        assert_eq!(score(&profile(0.95, 0.9, 0, 0)).score, 770);
        assert_eq!(score(&profile(0.85, 0.9, 0, 0)).score, 710);
        assert_eq!(score(&profile(0.75, 0.9, 0, 0)).score, 655);
        // Just below
        assert_eq!(score(&profile(0.7499, 0.9, 0, 0)).score, 600);

        assert_eq!(score(&profile(0.0, 0.10, 0, 0)).score, 710);
        assert_eq!(score(&profile(0.0, 0.25, 0, 0)).score, 677);
        assert_eq!(score(&profile(0.0, 0.26, 0, 0)).score, 600);

        assert_eq!(score(&profile(0.0, 0.9, 3, 0)).score, 690);
        assert_eq!(score(&profile(0.0, 0.9, 1, 0)).score, 645);

        assert_eq!(score(&profile(0.0, 0.9, 0, 3)).score, 655);
        assert_eq!(score(&profile(0.0, 0.9, 0, 2)).score, 628);
    }

    #[test]
    fn test_explanation_order_is_fixed() {
        let result = score(&profile(0.9, 0.2, 1, 2));
        let e = &result.explanation;

        let repay = e.find("good repayment rate").unwrap();
        let vol = e.find("moderate collateral volatility").unwrap();
        let endorse = e.find("some endorsers").unwrap();
        let chains = e.find("moderate chain usage").unwrap();
        assert!(repay < vol && vol < endorse && endorse < chains);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let p = profile(0.9, 0.2, 2, 2);
        assert_eq!(score(&p), score(&p));
    }

    #[test]
    fn test_credit_tier_from_score() {
        assert_eq!(CreditTier::from_score(850), CreditTier::Excellent);
        assert_eq!(CreditTier::from_score(800), CreditTier::Excellent);
        assert_eq!(CreditTier::from_score(799), CreditTier::Good);
        assert_eq!(CreditTier::from_score(740), CreditTier::Good);
        assert_eq!(CreditTier::from_score(670), CreditTier::Fair);
        assert_eq!(CreditTier::from_score(580), CreditTier::Poor);
        assert_eq!(CreditTier::from_score(579), CreditTier::HighRisk);
        assert_eq!(CreditTier::from_score(300), CreditTier::HighRisk);
    }

    #[test]
    fn test_tier_rates_are_ordered() {
        // A better tier never pays a higher rate
        assert!(CreditTier::Excellent.annual_rate() < CreditTier::Good.annual_rate());
        assert!(CreditTier::Good.annual_rate() < CreditTier::Fair.annual_rate());
        assert!(CreditTier::Fair.annual_rate() < CreditTier::Poor.annual_rate());
        assert!(CreditTier::Poor.annual_rate() < CreditTier::HighRisk.annual_rate());
    }
}
