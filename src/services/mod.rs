//! Business logic services for CrossLend

pub mod credit_scoring;
pub mod risk_engine;

pub use credit_scoring::{CreditProfile, CreditScore, CreditTier};
pub use risk_engine::RiskEngine;
