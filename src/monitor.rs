//! Health monitor - periodic collateral re-pricing
//!
//! Each sweep re-prices every active loan in its own task with its own
//! timeout, so one stuck price lookup cannot stall the sweep. A loan that
//! reaches a terminal state through another path while a sweep is in
//! flight simply loses the repository CAS; the sweep result is discarded.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::error::{LendingError, LendingResult};
use crate::loan::{Loan, LoanStatus, LIQUIDATION_THRESHOLD, WARNING_THRESHOLD};
use crate::oracle::PriceOracle;
use crate::repository::LoanRepository;
use crate::services::RiskEngine;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Budget for a single loan's price lookup and follow-up
    pub per_loan_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            per_loan_timeout: Duration::from_secs(10),
        }
    }
}

/// What a sweep did, for logging and tests
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub healthy: usize,
    pub warned: usize,
    pub liquidated: usize,
    pub defaulted: usize,
    pub failed: usize,
}

enum HealthVerdict {
    Healthy,
    Warned,
    Liquidated,
    /// Another writer settled the loan first
    Skipped,
}

pub struct HealthMonitor {
    engine: Arc<RiskEngine>,
    loans: Arc<dyn LoanRepository>,
    oracle: Arc<dyn PriceOracle>,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(
        engine: Arc<RiskEngine>,
        loans: Arc<dyn LoanRepository>,
        oracle: Arc<dyn PriceOracle>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            engine,
            loans,
            oracle,
            config,
        }
    }

    /// Run sweeps forever. Spawn this on the runtime; it never returns.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(interval_secs = self.config.interval.as_secs(), "Health monitor started");

        loop {
            match self.sweep().await {
                Ok(summary) => {
                    tracing::info!(
                        checked = summary.checked,
                        warned = summary.warned,
                        liquidated = summary.liquidated,
                        defaulted = summary.defaulted,
                        failed = summary.failed,
                        "Health sweep complete"
                    );
                }
                Err(e) => tracing::error!(error = %e, "Health sweep failed"),
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// One pass: default past-due loans, settle defaulted loans through
    /// liquidation, then re-price every remaining active loan.
    pub async fn sweep(&self) -> LendingResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        summary.defaulted = self.engine.lifecycle().detect_defaults().await?.len();

        for loan in self.loans.list_by_status(LoanStatus::Defaulted).await? {
            match self.engine.liquidate_loan(loan.id).await {
                Ok(_) => summary.liquidated += 1,
                Err(LendingError::ConcurrentModification)
                | Err(LendingError::InvalidTransition { .. }) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(loan_id = %loan.id, error = %e, "Default settlement failed");
                    summary.failed += 1;
                }
            }
        }

        let active = self.loans.list_by_status(LoanStatus::Active).await?;
        summary.checked = active.len();

        let tasks = active.into_iter().map(|loan| {
            let engine = self.engine.clone();
            let oracle = self.oracle.clone();
            let budget = self.config.per_loan_timeout;
            tokio::spawn(async move {
                tokio::time::timeout(budget, check_loan(engine, oracle, loan)).await
            })
        });

        for joined in join_all(tasks).await {
            match joined {
                Ok(Ok(Ok(HealthVerdict::Healthy))) => summary.healthy += 1,
                Ok(Ok(Ok(HealthVerdict::Warned))) => summary.warned += 1,
                Ok(Ok(Ok(HealthVerdict::Liquidated))) => summary.liquidated += 1,
                Ok(Ok(Ok(HealthVerdict::Skipped))) => {}
                Ok(Ok(Err(e))) => {
                    tracing::error!(error = %e, "Loan health check failed");
                    summary.failed += 1;
                }
                Ok(Err(_elapsed)) => {
                    tracing::warn!("Loan health check timed out");
                    summary.failed += 1;
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Loan health check panicked");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Price one loan's collateral and act on the health factor.
async fn check_loan(
    engine: Arc<RiskEngine>,
    oracle: Arc<dyn PriceOracle>,
    loan: Loan,
) -> LendingResult<HealthVerdict> {
    let price = oracle.get_price(&loan.collateral_asset).await?;
    let health = loan.health_factor(price * loan.collateral_amount);

    if health < LIQUIDATION_THRESHOLD {
        tracing::warn!(
            loan_id = %loan.id,
            health_factor = health,
            "Health breach, liquidating"
        );
        return match engine.liquidate_loan(loan.id).await {
            Ok(_) => Ok(HealthVerdict::Liquidated),
            // Lost the race: the loan settled through another path
            Err(LendingError::ConcurrentModification)
            | Err(LendingError::InvalidTransition { .. }) => Ok(HealthVerdict::Skipped),
            Err(e) => Err(e),
        };
    }

    if health < WARNING_THRESHOLD {
        tracing::warn!(
            loan_id = %loan.id,
            health_factor = health,
            "Loan in warning band"
        );
        return Ok(HealthVerdict::Warned);
    }

    Ok(HealthVerdict::Healthy)
}
