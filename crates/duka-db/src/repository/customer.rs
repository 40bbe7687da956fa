//! # Customer Repository
//!
//! Customers and their loyalty point running balances. The anonymous
//! walk-in customer is seeded at first run and never accrues points.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{Customer, WALK_IN_CUSTOMER_ID};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Seeds the anonymous walk-in customer (idempotent).
    pub async fn ensure_walk_in(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO customers (id, name, phone, loyalty_points, is_walk_in, created_at)
            VALUES (?1, 'Walk-in Customer', NULL, 0, 1, ?2)
            "#,
        )
        .bind(WALK_IN_CUSTOMER_ID)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, loyalty_points, is_walk_in, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.loyalty_points)
        .bind(customer.is_walk_in)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %customer.id, "Customer created");
        Ok(())
    }

    /// Fetches one customer by id (pool read).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, loyalty_points, is_walk_in, created_at
            FROM customers WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Fetches one customer on the caller's connection.
    pub async fn fetch(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, loyalty_points, is_walk_in, created_at
            FROM customers WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Writes the loyalty balance back after the engine computed
    /// `current − used + earned`.
    pub async fn save_points(
        &self,
        conn: &mut SqliteConnection,
        customer_id: &str,
        loyalty_points: i64,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET loyalty_points = ?2 WHERE id = ?1")
            .bind(customer_id)
            .bind(loyalty_points)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        debug!(customer_id = %customer_id, loyalty_points, "Loyalty balance updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use duka_core::WALK_IN_CUSTOMER_ID;

    #[tokio::test]
    async fn walk_in_seed_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        // Seeded by Database::new already; a second call must not fail
        repo.ensure_walk_in().await.unwrap();

        let walk_in = repo.get_by_id(WALK_IN_CUSTOMER_ID).await.unwrap();
        assert!(walk_in.is_walk_in);
        assert_eq!(walk_in.loyalty_points, 0);
    }
}
