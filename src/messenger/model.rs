//! Cross-chain message shapes
//!
//! A message is identified by its idempotency key, derived from the loan id
//! and the action. Re-sending after a timeout reuses the key, so the gateway
//! can deduplicate and an unknown outcome never double-executes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The four asset operations the protocol drives across chains
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrossChainAction {
    LockAndMint,
    BurnAndUnlock,
    DisburseFunds,
    SettleLiquidation,
}

impl CrossChainAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossChainAction::LockAndMint => "lock_and_mint",
            CrossChainAction::BurnAndUnlock => "burn_and_unlock",
            CrossChainAction::DisburseFunds => "disburse_funds",
            CrossChainAction::SettleLiquidation => "settle_liquidation",
        }
    }
}

impl std::fmt::Display for CrossChainAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway-reported message status
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Completed,
    Failed,
}

/// A single cross-chain operation request
#[derive(Debug, Serialize, Clone)]
pub struct CrossChainMessage {
    pub loan_id: Uuid,
    pub source_chain: String,
    pub target_chain: String,
    pub action: CrossChainAction,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

impl CrossChainMessage {
    pub fn new(
        loan_id: Uuid,
        source_chain: &str,
        target_chain: &str,
        action: CrossChainAction,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            loan_id,
            source_chain: source_chain.to_string(),
            target_chain: target_chain.to_string(),
            action,
            payload,
            idempotency_key: idempotency_key(loan_id, action),
        }
    }
}

/// `hex(sha256("{loan_id}:{action}"))`
pub fn idempotency_key(loan_id: Uuid, action: CrossChainAction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", loan_id, action).as_bytes());
    hex::encode(hasher.finalize())
}

/// Gateway receipt for a sent message
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CcmReceipt {
    pub transaction_id: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}
