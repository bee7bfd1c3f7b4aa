//! Storage interface for loans and endorsements
//!
//! The engines never touch storage directly; they go through these traits.
//! The write boundary enforces the loan state machine: a status write must
//! name the version it read, and the repository rejects it when the version
//! has moved (`ConcurrentModification`) or the transition is not in the
//! table (`InvalidTransition`). This gives per-loan single-writer semantics
//! without holding locks across await points.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::endorsement::model::Endorsement;
use crate::error::LendingResult;
use crate::loan::{ListLoansQuery, Loan, LoanStatus};

/// Loan storage
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn insert_loan(&self, loan: &Loan) -> LendingResult<()>;

    async fn get_loan(&self, id: Uuid) -> LendingResult<Option<Loan>>;

    async fn list_loans(&self, query: &ListLoansQuery) -> LendingResult<Vec<Loan>>;

    async fn list_by_status(&self, status: LoanStatus) -> LendingResult<Vec<Loan>>;

    async fn list_by_borrower(&self, borrower_id: &str) -> LendingResult<Vec<Loan>>;

    /// Compare-and-swap status write. Fails with `ConcurrentModification`
    /// when `expected_version` no longer matches, and with
    /// `InvalidTransition` when the state machine forbids the move.
    /// On success the stored version is bumped and the new row returned.
    async fn update_status(
        &self,
        id: Uuid,
        expected_version: i64,
        next: LoanStatus,
    ) -> LendingResult<Loan>;
}

/// Endorsement storage
#[async_trait]
pub trait EndorsementRepository: Send + Sync {
    async fn insert_endorsement(&self, endorsement: &Endorsement) -> LendingResult<()>;

    async fn get_endorsement(&self, id: Uuid) -> LendingResult<Option<Endorsement>>;

    async fn list_by_loan(&self, loan_id: Uuid) -> LendingResult<Vec<Endorsement>>;

    /// Count of validated endorsements backing a borrower, across loans.
    async fn count_valid_for_borrower(&self, borrower_id: &str) -> LendingResult<u32>;

    /// Persist the outcome of signature validation.
    async fn set_valid(&self, id: Uuid, is_valid: bool) -> LendingResult<Endorsement>;

    /// Compare-and-swap the processed flag. Fails with `AlreadyProcessed`
    /// if risk sharing was already applied, `ConcurrentModification` on a
    /// version race. This is what makes `apply_risk_sharing` at-most-once.
    async fn mark_processed(&self, id: Uuid, expected_version: i64) -> LendingResult<Endorsement>;
}
