//! # Product Repository
//!
//! Database operations for products and their stock-ledger counters.
//!
//! ## Stock Writes
//! Stock policy (reserve / release / deduct and their guards) is decided by
//! `duka_core::Product` methods; this repository only reads rows and writes
//! counters back. The engine fetches products inside its transaction,
//! mutates them in memory, then calls [`ProductRepository::save_stock`] on
//! the same connection, so the read-modify-write is covered by the
//! transaction's write lock.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::Product;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, product_type, price_cents, cost_price_cents,
    stock, reserved_stock, is_active, created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, product_type, price_cents, cost_price_cents,
                 stock, reserved_stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.product_type)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.stock)
        .bind(product.reserved_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(())
    }

    /// Fetches one product by id (pool read).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Fetches one product on the caller's connection, so the row the
    /// engine mutates was read under the same transaction that will write
    /// it back.
    pub async fn fetch(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Writes the stock-ledger counters back after an in-memory mutation.
    pub async fn save_stock(
        &self,
        conn: &mut SqliteConnection,
        product: &Product,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = ?2, reserved_stock = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(product.stock)
        .bind(product.reserved_stock)
        .bind(chrono::Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        debug!(
            product_id = %product.id,
            stock = product.stock,
            reserved = product.reserved_stock,
            "Stock counters updated"
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
