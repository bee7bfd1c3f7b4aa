//! In-memory repository for development mode and tests
//!
//! State lives in `Arc<RwLock<HashMap>>`, so clones share the same store.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::endorsement::model::Endorsement;
use crate::error::{LendingError, LendingResult};
use crate::loan::{ListLoansQuery, Loan, LoanStatus};

use super::{EndorsementRepository, LoanRepository};

/// Shared in-memory store for loans and endorsements
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    loans: Arc<RwLock<HashMap<Uuid, Loan>>>,
    endorsements: Arc<RwLock<HashMap<Uuid, Endorsement>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanRepository for InMemoryRepository {
    async fn insert_loan(&self, loan: &Loan) -> LendingResult<()> {
        let mut loans = self.loans.write().await;
        loans.insert(loan.id, loan.clone());
        Ok(())
    }

    async fn get_loan(&self, id: Uuid) -> LendingResult<Option<Loan>> {
        let loans = self.loans.read().await;
        Ok(loans.get(&id).cloned())
    }

    async fn list_loans(&self, query: &ListLoansQuery) -> LendingResult<Vec<Loan>> {
        let loans = self.loans.read().await;
        let mut out: Vec<Loan> = loans
            .values()
            .filter(|l| {
                query
                    .borrower_id
                    .as_ref()
                    .map_or(true, |b| &l.borrower_id == b)
                    && query.status.map_or(true, |s| l.status == s)
            })
            .cloned()
            .collect();
        out.sort_by_key(|l| l.created_at);
        if let Some(limit) = query.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn list_by_status(&self, status: LoanStatus) -> LendingResult<Vec<Loan>> {
        self.list_loans(&ListLoansQuery {
            status: Some(status),
            ..Default::default()
        })
        .await
    }

    async fn list_by_borrower(&self, borrower_id: &str) -> LendingResult<Vec<Loan>> {
        self.list_loans(&ListLoansQuery {
            borrower_id: Some(borrower_id.to_string()),
            ..Default::default()
        })
        .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_version: i64,
        next: LoanStatus,
    ) -> LendingResult<Loan> {
        let mut loans = self.loans.write().await;
        let loan = loans
            .get_mut(&id)
            .ok_or_else(|| LendingError::NotFound(format!("loan {}", id)))?;

        if loan.version != expected_version {
            return Err(LendingError::ConcurrentModification);
        }
        if !loan.status.can_transition_to(next) {
            return Err(LendingError::InvalidTransition {
                from: loan.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        loan.status = next;
        loan.version += 1;
        loan.updated_at = Utc::now();
        Ok(loan.clone())
    }
}

#[async_trait]
impl EndorsementRepository for InMemoryRepository {
    async fn insert_endorsement(&self, endorsement: &Endorsement) -> LendingResult<()> {
        if !(crate::endorsement::model::MIN_ENDORSEMENT_PERCENTAGE
            ..=crate::endorsement::model::MAX_ENDORSEMENT_PERCENTAGE)
            .contains(&endorsement.percentage)
        {
            return Err(LendingError::Validation(format!(
                "endorsement percentage {} outside [10, 30]",
                endorsement.percentage
            )));
        }
        let mut endorsements = self.endorsements.write().await;
        endorsements.insert(endorsement.id, endorsement.clone());
        Ok(())
    }

    async fn get_endorsement(&self, id: Uuid) -> LendingResult<Option<Endorsement>> {
        let endorsements = self.endorsements.read().await;
        Ok(endorsements.get(&id).cloned())
    }

    async fn list_by_loan(&self, loan_id: Uuid) -> LendingResult<Vec<Endorsement>> {
        let endorsements = self.endorsements.read().await;
        let mut out: Vec<Endorsement> = endorsements
            .values()
            .filter(|e| e.loan_id == loan_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    async fn count_valid_for_borrower(&self, borrower_id: &str) -> LendingResult<u32> {
        let endorsements = self.endorsements.read().await;
        Ok(endorsements
            .values()
            .filter(|e| e.borrower_id == borrower_id && e.is_valid)
            .count() as u32)
    }

    async fn set_valid(&self, id: Uuid, is_valid: bool) -> LendingResult<Endorsement> {
        let mut endorsements = self.endorsements.write().await;
        let endorsement = endorsements
            .get_mut(&id)
            .ok_or_else(|| LendingError::NotFound(format!("endorsement {}", id)))?;
        endorsement.is_valid = is_valid;
        endorsement.version += 1;
        Ok(endorsement.clone())
    }

    async fn mark_processed(&self, id: Uuid, expected_version: i64) -> LendingResult<Endorsement> {
        let mut endorsements = self.endorsements.write().await;
        let endorsement = endorsements
            .get_mut(&id)
            .ok_or_else(|| LendingError::NotFound(format!("endorsement {}", id)))?;

        if endorsement.is_processed {
            return Err(LendingError::AlreadyProcessed(id));
        }
        if endorsement.version != expected_version {
            return Err(LendingError::ConcurrentModification);
        }

        endorsement.is_processed = true;
        endorsement.version += 1;
        Ok(endorsement.clone())
    }
}
