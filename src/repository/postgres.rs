//! Postgres repository backed by sqlx
//!
//! Status writes run in a transaction with a row lock so the version check
//! and the update are atomic against concurrent writers.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::endorsement::model::{
    Endorsement, MAX_ENDORSEMENT_PERCENTAGE, MIN_ENDORSEMENT_PERCENTAGE,
};
use crate::error::{LendingError, LendingResult};
use crate::loan::{ListLoansQuery, Loan, LoanStatus};

use super::{EndorsementRepository, LoanRepository};

#[derive(Clone)]
pub struct PostgresRepository {
    db_pool: PgPool,
}

impl PostgresRepository {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl LoanRepository for PostgresRepository {
    async fn insert_loan(&self, loan: &Loan) -> LendingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, borrower_id, collateral_asset, collateral_chain,
                borrow_asset, borrow_chain, collateral_amount, principal,
                term_days, interest_rate, status, version,
                due_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(loan.id)
        .bind(&loan.borrower_id)
        .bind(&loan.collateral_asset)
        .bind(&loan.collateral_chain)
        .bind(&loan.borrow_asset)
        .bind(&loan.borrow_chain)
        .bind(loan.collateral_amount)
        .bind(loan.principal)
        .bind(loan.term_days)
        .bind(loan.interest_rate)
        .bind(loan.status)
        .bind(loan.version)
        .bind(loan.due_at)
        .bind(loan.created_at)
        .bind(loan.updated_at)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn get_loan(&self, id: Uuid) -> LendingResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(loan)
    }

    async fn list_loans(&self, query: &ListLoansQuery) -> LendingResult<Vec<Loan>> {
        let limit = query.limit.unwrap_or(100).min(1000) as i64;
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE ($1::text IS NULL OR borrower_id = $1)
              AND ($2::loan_status IS NULL OR status = $2)
            ORDER BY created_at
            LIMIT $3
            "#,
        )
        .bind(&query.borrower_id)
        .bind(query.status)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(loans)
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
        let mut tx = self.db_pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
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

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, version = version + 1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}

#[async_trait]
impl EndorsementRepository for PostgresRepository {
    async fn insert_endorsement(&self, endorsement: &Endorsement) -> LendingResult<()> {
        if !(MIN_ENDORSEMENT_PERCENTAGE..=MAX_ENDORSEMENT_PERCENTAGE)
            .contains(&endorsement.percentage)
        {
            return Err(LendingError::Validation(format!(
                "endorsement percentage {} outside [10, 30]",
                endorsement.percentage
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO endorsements (
                id, loan_id, endorser_id, borrower_id, percentage,
                signature, is_valid, is_processed, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(endorsement.id)
        .bind(endorsement.loan_id)
        .bind(&endorsement.endorser_id)
        .bind(&endorsement.borrower_id)
        .bind(endorsement.percentage)
        .bind(&endorsement.signature)
        .bind(endorsement.is_valid)
        .bind(endorsement.is_processed)
        .bind(endorsement.version)
        .bind(endorsement.created_at)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn get_endorsement(&self, id: Uuid) -> LendingResult<Option<Endorsement>> {
        let endorsement =
            sqlx::query_as::<_, Endorsement>("SELECT * FROM endorsements WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;
        Ok(endorsement)
    }

    async fn list_by_loan(&self, loan_id: Uuid) -> LendingResult<Vec<Endorsement>> {
        let endorsements = sqlx::query_as::<_, Endorsement>(
            "SELECT * FROM endorsements WHERE loan_id = $1 ORDER BY created_at",
        )
        .bind(loan_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(endorsements)
    }

    async fn count_valid_for_borrower(&self, borrower_id: &str) -> LendingResult<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM endorsements WHERE borrower_id = $1 AND is_valid = TRUE",
        )
        .bind(borrower_id)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(count as u32)
    }

    async fn set_valid(&self, id: Uuid, is_valid: bool) -> LendingResult<Endorsement> {
        let endorsement = sqlx::query_as::<_, Endorsement>(
            r#"
            UPDATE endorsements
            SET is_valid = $1, version = version + 1
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(is_valid)
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| LendingError::NotFound(format!("endorsement {}", id)))?;
        Ok(endorsement)
    }

    async fn mark_processed(&self, id: Uuid, expected_version: i64) -> LendingResult<Endorsement> {
        let mut tx = self.db_pool.begin().await?;

        let endorsement =
            sqlx::query_as::<_, Endorsement>("SELECT * FROM endorsements WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| LendingError::NotFound(format!("endorsement {}", id)))?;

        if endorsement.is_processed {
            return Err(LendingError::AlreadyProcessed(id));
        }
        if endorsement.version != expected_version {
            return Err(LendingError::ConcurrentModification);
        }

        let updated = sqlx::query_as::<_, Endorsement>(
            r#"
            UPDATE endorsements
            SET is_processed = TRUE, version = version + 1
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}
