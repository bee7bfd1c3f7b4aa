//! Gateway client and retry policy
//!
//! Every send is timeout-bounded. A timeout means the outcome is unknown,
//! not failed: the caller may re-send with the same idempotency key or park
//! the loan in a pending-reconciliation state.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use rand::Rng;

use crate::error::{LendingError, LendingResult};

use super::model::{CcmReceipt, CrossChainMessage, MessageStatus};

/// Cross-chain gateway operations
#[async_trait]
pub trait CrossChainMessenger: Send + Sync {
    /// Send a message and wait for the gateway's receipt.
    async fn send(&self, message: &CrossChainMessage) -> LendingResult<CcmReceipt>;

    /// Cross-chain balances for a wallet, chain name to amount.
    async fn get_balances(&self, address: &str) -> LendingResult<HashMap<String, f64>>;
}

/// HTTP client for the cross-chain gateway
#[derive(Clone)]
pub struct GatewayMessenger {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GatewayMessenger {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            timeout,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[async_trait]
impl CrossChainMessenger for GatewayMessenger {
    async fn send(&self, message: &CrossChainMessage) -> LendingResult<CcmReceipt> {
        let request = self
            .request(reqwest::Method::POST, "/v1/messages")
            .json(message)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| LendingError::MessengerTimeout {
                loan_id: message.loan_id,
                action: message.action.as_str().to_string(),
            })??;

        let response =
            response
                .error_for_status()
                .map_err(|e| LendingError::MessengerFailure {
                    loan_id: message.loan_id,
                    action: message.action.as_str().to_string(),
                    reason: e.to_string(),
                })?;

        let receipt: CcmReceipt = response.json().await?;

        tracing::info!(
            loan_id = %message.loan_id,
            action = %message.action,
            tx_id = %receipt.transaction_id,
            status = ?receipt.status,
            "Cross-chain message sent"
        );

        if receipt.status == MessageStatus::Failed {
            return Err(LendingError::MessengerFailure {
                loan_id: message.loan_id,
                action: message.action.as_str().to_string(),
                reason: format!("gateway reported failure, tx {}", receipt.transaction_id),
            });
        }

        Ok(receipt)
    }

    async fn get_balances(&self, address: &str) -> LendingResult<HashMap<String, f64>> {
        let request = self
            .request(reqwest::Method::GET, "/v1/balances")
            .query(&[("address", address)])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| LendingError::ExternalService("balance lookup timed out".to_string()))??;

        let balances = response.error_for_status()?.json().await?;
        Ok(balances)
    }
}

/// Exponential backoff with jitter for retryable messenger errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Send with retries. Non-retryable errors return immediately; the last
    /// retryable error is returned once attempts are exhausted.
    pub async fn send_with_retry(
        &self,
        messenger: &dyn CrossChainMessenger,
        message: &CrossChainMessage,
    ) -> LendingResult<CcmReceipt> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match messenger.send(message).await {
                Ok(receipt) => return Ok(receipt),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                    tracing::warn!(
                        loan_id = %message.loan_id,
                        action = %message.action,
                        attempt = attempt,
                        error = %err,
                        "Messenger send failed, retrying"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
