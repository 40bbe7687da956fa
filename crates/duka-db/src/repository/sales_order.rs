//! # Sales Order Repository
//!
//! Customer orders fulfilled later: header rows plus lines carrying the
//! `quantity_received` counter that goods receipts advance.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{SalesOrder, SalesOrderItem};

const ORDER_COLUMNS: &str =
    "id, customer_id, total_cents, deposit_cents, balance_cents, status, created_at";

const ITEM_COLUMNS: &str = r#"
    id, sales_order_id, product_id, name_snapshot,
    quantity, quantity_received, unit_price_cents
"#;

/// Repository for sales order database operations.
#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
}

impl SalesOrderRepository {
    /// Creates a new SalesOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesOrderRepository { pool }
    }

    /// Inserts a sales order together with its lines.
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        order: &SalesOrder,
        items: &[SalesOrderItem],
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales_orders
                (id, customer_id, total_cents, deposit_cents, balance_cents, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(order.total_cents)
        .bind(order.deposit_cents)
        .bind(order.balance_cents)
        .bind(order.status)
        .bind(order.created_at)
        .execute(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sales_order_items
                    (id, sales_order_id, product_id, name_snapshot,
                     quantity, quantity_received, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sales_order_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.quantity_received)
            .bind(item.unit_price_cents)
            .execute(&mut *conn)
            .await?;
        }

        debug!(sales_order_id = %order.id, items = items.len(), "Sales order opened");
        Ok(())
    }

    /// Fetches one sales order by id (pool read).
    pub async fn get_by_id(&self, id: &str) -> DbResult<SalesOrder> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM sales_orders WHERE id = ?1");
        sqlx::query_as::<_, SalesOrder>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("SalesOrder", id))
    }

    /// Fetches one sales order on the caller's connection.
    pub async fn fetch(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<SalesOrder> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM sales_orders WHERE id = ?1");
        sqlx::query_as::<_, SalesOrder>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("SalesOrder", id))
    }

    /// Writes balance and status back after a transition.
    pub async fn save(&self, conn: &mut SqliteConnection, order: &SalesOrder) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE sales_orders SET balance_cents = ?2, status = ?3 WHERE id = ?1")
                .bind(&order.id)
                .bind(order.balance_cents)
                .bind(order.status)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SalesOrder", &order.id));
        }
        Ok(())
    }

    /// Order lines (pool read).
    pub async fn items_for(&self, sales_order_id: &str) -> DbResult<Vec<SalesOrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sales_order_items WHERE sales_order_id = ?1");
        let items = sqlx::query_as::<_, SalesOrderItem>(&sql)
            .bind(sales_order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Order lines on the caller's connection.
    pub async fn items_for_tx(
        &self,
        conn: &mut SqliteConnection,
        sales_order_id: &str,
    ) -> DbResult<Vec<SalesOrderItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM sales_order_items WHERE sales_order_id = ?1");
        let items = sqlx::query_as::<_, SalesOrderItem>(&sql)
            .bind(sales_order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }

    /// Writes one line's received counter back after a goods receipt.
    pub async fn save_item(
        &self,
        conn: &mut SqliteConnection,
        item: &SalesOrderItem,
    ) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE sales_order_items SET quantity_received = ?2 WHERE id = ?1")
                .bind(&item.id)
                .bind(item.quantity_received)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SalesOrderItem", &item.id));
        }
        Ok(())
    }
}
