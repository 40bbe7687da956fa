//! # Repository Implementations
//!
//! Data access for each aggregate, following the repository pattern.
//!
//! ## Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Repository Pattern                                  │
//! │                                                                         │
//! │  duka-engine (orchestration)                                            │
//! │       │                                                                 │
//! │       │ calls                                                           │
//! │       ▼                                                                 │
//! │  Repository (this module) ← SQL lives here, nowhere else               │
//! │       │                                                                 │
//! │       │ reads go through the pool;                                      │
//! │       │ writes take &mut SqliteConnection so the engine can pass        │
//! │       │ one transaction handle through every step of a completion       │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row mapping targets the plain structs in `duka-core` (via their
//! feature-gated `sqlx::FromRow` derives); repositories never define their
//! own domain types.

pub mod account;
pub mod audit;
pub mod customer;
pub mod layaway;
pub mod product;
pub mod quotation;
pub mod sale;
pub mod sales_order;
pub mod shift;
pub mod work_order;
