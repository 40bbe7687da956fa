//! # Quotation Repository
//!
//! Priced offers. The only lifecycle write the engine needs is flipping a
//! quotation to Invoiced when a sale completes against it.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use duka_core::{Quotation, QuotationStatus};

/// Repository for quotation database operations.
#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    /// Creates a new QuotationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    /// Inserts a new quotation.
    pub async fn insert(&self, quotation: &Quotation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quotations (id, customer_id, total_cents, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&quotation.id)
        .bind(&quotation.customer_id)
        .bind(quotation.total_cents)
        .bind(quotation.status)
        .bind(quotation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetches one quotation by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Quotation> {
        sqlx::query_as::<_, Quotation>(
            "SELECT id, customer_id, total_cents, status, created_at FROM quotations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Quotation", id))
    }

    /// Status write, used by the completion path to mark Invoiced.
    pub async fn set_status(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        status: QuotationStatus,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE quotations SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }
        Ok(())
    }
}
