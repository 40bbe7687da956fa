//! # Sale Repository
//!
//! Persistence for the immutable receipt triple: sale header, line items,
//! payments. All three insert on the caller's connection, so a sale only
//! ever appears in the database whole or not at all.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{Sale, SaleItem, SalePayment};

const SALE_COLUMNS: &str = r#"
    id, receipt_number, customer_id, cashier_id, shift_id,
    quotation_id, work_order_id, sales_order_id, layaway_id,
    total_cents, change_cents, tax_cents, taxable_cents,
    grand_total_cents, deposit_applied_cents, balance_due_cents,
    points_earned, points_used, points_balance_after, created_at
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts the full receipt: header, items, payments.
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        sale: &Sale,
        items: &[SaleItem],
        payments: &[SalePayment],
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales
                (id, receipt_number, customer_id, cashier_id, shift_id,
                 quotation_id, work_order_id, sales_order_id, layaway_id,
                 total_cents, change_cents, tax_cents, taxable_cents,
                 grand_total_cents, deposit_applied_cents, balance_due_cents,
                 points_earned, points_used, points_balance_after, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.customer_id)
        .bind(&sale.cashier_id)
        .bind(&sale.shift_id)
        .bind(&sale.quotation_id)
        .bind(&sale.work_order_id)
        .bind(&sale.sales_order_id)
        .bind(&sale.layaway_id)
        .bind(sale.total_cents)
        .bind(sale.change_cents)
        .bind(sale.tax_cents)
        .bind(sale.taxable_cents)
        .bind(sale.grand_total_cents)
        .bind(sale.deposit_applied_cents)
        .bind(sale.balance_due_cents)
        .bind(sale.points_earned)
        .bind(sale.points_used)
        .bind(sale.points_balance_after)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items
                    (id, sale_id, product_id, name_snapshot, unit_price_cents,
                     quantity, cost_price_cents, line_total_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.cost_price_cents)
            .bind(item.line_total_cents)
            .execute(&mut *conn)
            .await?;
        }

        for payment in payments {
            sqlx::query(
                r#"
                INSERT INTO sale_payments (id, sale_id, method, amount_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(payment.created_at)
            .execute(&mut *conn)
            .await?;
        }

        debug!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            items = items.len(),
            payments = payments.len(),
            "Sale persisted"
        );
        Ok(())
    }

    /// Fetches one sale header by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Line items for one sale.
    pub async fn items_for(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, name_snapshot, unit_price_cents,
                   quantity, cost_price_cents, line_total_cents
            FROM sale_items WHERE sale_id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Payments for one sale.
    pub async fn payments_for(&self, sale_id: &str) -> DbResult<Vec<SalePayment>> {
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, method, amount_cents, created_at
            FROM sale_payments WHERE sale_id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// All sales of one shift, each paired with its payments. Feeds the
    /// shift-close reconciliation.
    pub async fn sales_for_shift(
        &self,
        shift_id: &str,
    ) -> DbResult<Vec<(Sale, Vec<SalePayment>)>> {
        let sql =
            format!("SELECT {SALE_COLUMNS} FROM sales WHERE shift_id = ?1 ORDER BY created_at");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(shift_id)
            .fetch_all(&self.pool)
            .await?;

        let mut result = Vec::with_capacity(sales.len());
        for sale in sales {
            let payments = self.payments_for(&sale.id).await?;
            result.push((sale, payments));
        }
        Ok(result)
    }

    /// Total number of sales ever recorded; the engine derives receipt
    /// numbers from it.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
