//! # Work Order Repository
//!
//! Work orders and their bill-of-materials lines. Materials live in their
//! own table keyed by `work_order_id`, so cancelling an order releases its
//! reservations by a single FK-filtered read.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{WorkOrder, WorkOrderMaterial};

const WORK_ORDER_COLUMNS: &str = r#"
    id, customer_id, description, total_cost_cents,
    amount_paid_cents, balance_due_cents, status, created_at
"#;

/// Repository for work order database operations.
#[derive(Debug, Clone)]
pub struct WorkOrderRepository {
    pool: SqlitePool,
}

impl WorkOrderRepository {
    /// Creates a new WorkOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WorkOrderRepository { pool }
    }

    /// Inserts a work order together with its bill of materials.
    pub async fn insert(
        &self,
        conn: &mut SqliteConnection,
        order: &WorkOrder,
        materials: &[WorkOrderMaterial],
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_orders
                (id, customer_id, description, total_cost_cents,
                 amount_paid_cents, balance_due_cents, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(&order.description)
        .bind(order.total_cost_cents)
        .bind(order.amount_paid_cents)
        .bind(order.balance_due_cents)
        .bind(order.status)
        .bind(order.created_at)
        .execute(&mut *conn)
        .await?;

        for material in materials {
            sqlx::query(
                r#"
                INSERT INTO work_order_materials (id, work_order_id, product_id, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&material.id)
            .bind(&material.work_order_id)
            .bind(&material.product_id)
            .bind(material.quantity)
            .execute(&mut *conn)
            .await?;
        }

        debug!(
            work_order_id = %order.id,
            materials = materials.len(),
            "Work order opened"
        );
        Ok(())
    }

    /// Fetches one work order by id (pool read).
    pub async fn get_by_id(&self, id: &str) -> DbResult<WorkOrder> {
        let sql = format!("SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE id = ?1");
        sqlx::query_as::<_, WorkOrder>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("WorkOrder", id))
    }

    /// Fetches one work order on the caller's connection.
    pub async fn fetch(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<WorkOrder> {
        let sql = format!("SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE id = ?1");
        sqlx::query_as::<_, WorkOrder>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("WorkOrder", id))
    }

    /// Writes paid amount, balance and status back after a transition.
    pub async fn save(&self, conn: &mut SqliteConnection, order: &WorkOrder) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE work_orders
            SET amount_paid_cents = ?2, balance_due_cents = ?3, status = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(order.amount_paid_cents)
        .bind(order.balance_due_cents)
        .bind(order.status)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("WorkOrder", &order.id));
        }
        Ok(())
    }

    /// Bill of materials for one order (pool read).
    pub async fn materials_for(&self, work_order_id: &str) -> DbResult<Vec<WorkOrderMaterial>> {
        let materials = sqlx::query_as::<_, WorkOrderMaterial>(
            r#"
            SELECT id, work_order_id, product_id, quantity
            FROM work_order_materials WHERE work_order_id = ?1
            "#,
        )
        .bind(work_order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(materials)
    }

    /// Bill of materials on the caller's connection, for fulfilment and
    /// cancellation inside a transaction.
    pub async fn materials_for_tx(
        &self,
        conn: &mut SqliteConnection,
        work_order_id: &str,
    ) -> DbResult<Vec<WorkOrderMaterial>> {
        let materials = sqlx::query_as::<_, WorkOrderMaterial>(
            r#"
            SELECT id, work_order_id, product_id, quantity
            FROM work_order_materials WHERE work_order_id = ?1
            "#,
        )
        .bind(work_order_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(materials)
    }
}
