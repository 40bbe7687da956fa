//! # Shift Repository
//!
//! Shift rows, their expenses (drawer payouts) and the time-clock rows
//! that bracket each shift.
//!
//! The partial unique index `idx_shifts_one_active_per_user` backs up the
//! engine's "one active shift per user" guard at the storage level.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::{Expense, Shift};

const SHIFT_COLUMNS: &str = r#"
    id, user_id, start_time, end_time, status,
    starting_float_cents, total_sales_cents, total_payouts_cents,
    expected_cash_cents, actual_cash_cents, cash_variance_cents,
    payment_breakdown, float_transaction_id, notes
"#;

/// Repository for shift database operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Inserts a freshly started shift.
    pub async fn insert(&self, conn: &mut SqliteConnection, shift: &Shift) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shifts
                (id, user_id, start_time, end_time, status,
                 starting_float_cents, total_sales_cents, total_payouts_cents,
                 expected_cash_cents, actual_cash_cents, cash_variance_cents,
                 payment_breakdown, float_transaction_id, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.user_id)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.status)
        .bind(shift.starting_float_cents)
        .bind(shift.total_sales_cents)
        .bind(shift.total_payouts_cents)
        .bind(shift.expected_cash_cents)
        .bind(shift.actual_cash_cents)
        .bind(shift.cash_variance_cents)
        .bind(&shift.payment_breakdown)
        .bind(&shift.float_transaction_id)
        .bind(&shift.notes)
        .execute(&mut *conn)
        .await?;

        debug!(shift_id = %shift.id, user_id = %shift.user_id, "Shift opened");
        Ok(())
    }

    /// Fetches one shift by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Shift> {
        let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1");
        sqlx::query_as::<_, Shift>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", id))
    }

    /// The user's active shift, if any.
    pub async fn active_for_user(&self, user_id: &str) -> DbResult<Option<Shift>> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE user_id = ?1 AND status = 'active'"
        );
        let shift = sqlx::query_as::<_, Shift>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shift)
    }

    /// Writes the close-out: reconciliation numbers, breakdown JSON,
    /// status flip. Gated on `status = 'active'` so a double close is a
    /// no-op at the storage level and surfaces as NotFound here.
    pub async fn save_close(&self, conn: &mut SqliteConnection, shift: &Shift) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET end_time = ?2, status = ?3,
                total_sales_cents = ?4, total_payouts_cents = ?5,
                expected_cash_cents = ?6, actual_cash_cents = ?7,
                cash_variance_cents = ?8, payment_breakdown = ?9, notes = ?10
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(&shift.id)
        .bind(shift.end_time)
        .bind(shift.status)
        .bind(shift.total_sales_cents)
        .bind(shift.total_payouts_cents)
        .bind(shift.expected_cash_cents)
        .bind(shift.actual_cash_cents)
        .bind(shift.cash_variance_cents)
        .bind(&shift.payment_breakdown)
        .bind(&shift.notes)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Active shift", &shift.id));
        }

        debug!(shift_id = %shift.id, "Shift closed");
        Ok(())
    }

    /// Records a cash payout against the shift.
    pub async fn insert_expense(
        &self,
        conn: &mut SqliteConnection,
        expense: &Expense,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, shift_id, description, amount_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.shift_id)
        .bind(&expense.description)
        .bind(expense.amount_cents)
        .bind(expense.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            shift_id = %expense.shift_id,
            amount_cents = expense.amount_cents,
            "Expense recorded"
        );
        Ok(())
    }

    /// All payouts for one shift.
    pub async fn expenses_for(&self, shift_id: &str) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, shift_id, description, amount_cents, created_at
            FROM expenses WHERE shift_id = ?1 ORDER BY created_at
            "#,
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(expenses)
    }

    /// Opens a time-clock row alongside the shift.
    pub async fn clock_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        shift_id: &str,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO time_clock (id, user_id, shift_id, clock_in, clock_out)
            VALUES (?1, ?2, ?3, ?4, NULL)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(shift_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(id)
    }

    /// Stamps clock-out on the shift's open time-clock row.
    pub async fn clock_out(&self, conn: &mut SqliteConnection, shift_id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE time_clock SET clock_out = ?2 WHERE shift_id = ?1 AND clock_out IS NULL",
        )
        .bind(shift_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
