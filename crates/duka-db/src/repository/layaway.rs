//! # Layaway Repository
//!
//! Layaway plans and their append-only payment histories. State
//! transitions happen on the `duka_core::Layaway` value; `save` writes
//! the resulting balance and status back.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{Layaway, LayawayPayment};

const LAYAWAY_COLUMNS: &str = "id, customer_id, total_cents, balance_cents, status, created_at";

/// Repository for layaway database operations.
#[derive(Debug, Clone)]
pub struct LayawayRepository {
    pool: SqlitePool,
}

impl LayawayRepository {
    /// Creates a new LayawayRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LayawayRepository { pool }
    }

    /// Inserts a new layaway plan.
    pub async fn insert(&self, conn: &mut SqliteConnection, layaway: &Layaway) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO layaways (id, customer_id, total_cents, balance_cents, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&layaway.id)
        .bind(&layaway.customer_id)
        .bind(layaway.total_cents)
        .bind(layaway.balance_cents)
        .bind(layaway.status)
        .bind(layaway.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(layaway_id = %layaway.id, total_cents = layaway.total_cents, "Layaway opened");
        Ok(())
    }

    /// Fetches one layaway by id (pool read).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Layaway> {
        let sql = format!("SELECT {LAYAWAY_COLUMNS} FROM layaways WHERE id = ?1");
        sqlx::query_as::<_, Layaway>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Layaway", id))
    }

    /// Fetches one layaway on the caller's connection.
    pub async fn fetch(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Layaway> {
        let sql = format!("SELECT {LAYAWAY_COLUMNS} FROM layaways WHERE id = ?1");
        sqlx::query_as::<_, Layaway>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Layaway", id))
    }

    /// Writes balance and status back after a state transition.
    pub async fn save(&self, conn: &mut SqliteConnection, layaway: &Layaway) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE layaways SET balance_cents = ?2, status = ?3 WHERE id = ?1")
                .bind(&layaway.id)
                .bind(layaway.balance_cents)
                .bind(layaway.status)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Layaway", &layaway.id));
        }
        Ok(())
    }

    /// Appends one installment record.
    pub async fn insert_payment(
        &self,
        conn: &mut SqliteConnection,
        payment: &LayawayPayment,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO layaway_payments (id, layaway_id, sale_id, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.layaway_id)
        .bind(&payment.sale_id)
        .bind(payment.amount_cents)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// The installment history for one plan, oldest first.
    pub async fn payments_for(&self, layaway_id: &str) -> DbResult<Vec<LayawayPayment>> {
        let payments = sqlx::query_as::<_, LayawayPayment>(
            r#"
            SELECT id, layaway_id, sale_id, amount_cents, created_at
            FROM layaway_payments WHERE layaway_id = ?1 ORDER BY created_at
            "#,
        )
        .bind(layaway_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}
