//! # duka-db: Database Layer for Duka POS
//!
//! This crate provides database access for the Duka POS system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka POS Data Flow                               │
//! │                                                                         │
//! │  duka-engine (complete_sale, start_shift, ...)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (account.rs,  │    │  (embedded)  │  │   │
//! │  │   │               │    │  sale.rs ...) │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ write methods │    │ 001_init.sql │  │   │
//! │  │   │ begin() → tx  │    │ take &mut conn│    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode, foreign keys on)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, configuration, transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/duka.db")).await?;
//!
//! // Plain reads go through repositories on the pool
//! let products = db.products().list_active().await?;
//!
//! // Multi-step writes share one transaction
//! let mut tx = db.begin().await?;
//! db.sales().insert(&mut tx, &sale, &items, &payments).await?;
//! db.accounts().insert_transaction(&mut tx, &posting).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::audit::AuditRepository;
pub use repository::customer::CustomerRepository;
pub use repository::layaway::LayawayRepository;
pub use repository::product::ProductRepository;
pub use repository::quotation::QuotationRepository;
pub use repository::sale::SaleRepository;
pub use repository::sales_order::SalesOrderRepository;
pub use repository::shift::ShiftRepository;
pub use repository::work_order::WorkOrderRepository;
