//! # duka-core: Pure Business Logic for Duka POS
//!
//! This crate is the **heart** of Duka POS. It contains the rules that keep
//! three interdependent ledgers consistent - the financial general ledger,
//! the inventory stock ledger, and the deferred-payment plans - as pure
//! logic with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Duka POS Architecture                          │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                duka-engine (orchestration)                  │   │
//! │  │   sale completion, ledger posting, shift sessions, plans    │   │
//! │  └──────────────────────────────┬──────────────────────────────┘   │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼──────────────────────────────┐   │
//! │  │              ★ duka-core (THIS CRATE) ★                     │   │
//! │  │                                                             │   │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ ┌──────────┐  │   │
//! │  │  │ money  │ │ ledger │ │ types  │ │ plans  │ │  shift   │  │   │
//! │  │  │ Money  │ │Balance │ │Product │ │Layaway │ │ Totals   │  │   │
//! │  │  │TaxRate │ │ rules  │ │ Sale   │ │WO / SO │ │ Variance │  │   │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘ └──────────┘  │   │
//! │  │                                                             │   │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS         │   │
//! │  └──────────────────────────────┬──────────────────────────────┘   │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼──────────────────────────────┐   │
//! │  │                  duka-db (SQLite layer)                      │   │
//! │  └──────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cents `Money`, VAT math, the balance tolerance
//! - [`ledger`] - Accounts, journal entries, balanced transactions
//! - [`types`] - Product (stock ledger), Customer, Sale, payments
//! - [`plans`] - Layaway / WorkOrder / SalesOrder state machines
//! - [`shift`] - Shift entity and closing reconciliation math
//! - [`origin`] - The `PaymentOrigin` tagged union
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Invariants at construction**: an unbalanced `AccountingTransaction`
//!    cannot be built, so it can never be persisted
//! 2. **Integer money**: all amounts are cents (i64), no floating point
//! 3. **Explicit errors**: typed errors, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod origin;
pub mod plans;
pub mod shift;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{
    account_balance, default_chart_of_accounts, Account, AccountType, AccountingTransaction,
    JournalEntry, ReferenceType,
};
pub use money::{Money, TaxRate, BALANCE_TOLERANCE_CENTS};
pub use origin::PaymentOrigin;
pub use plans::{
    receipt_status, Layaway, LayawayPayment, LayawayStatus, SalesOrder, SalesOrderItem,
    SalesOrderStatus, WorkOrder, WorkOrderMaterial, WorkOrderStatus,
};
pub use shift::{cash_variance, Shift, ShiftStatus, ShiftTotals};
pub use types::{
    AuditEntry, Customer, Expense, PaymentMethod, Product, ProductType, Quotation,
    QuotationStatus, Sale, SaleItem, SalePayment,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Id of the anonymous walk-in customer seeded at first run.
///
/// Walk-in sales are attached to this customer; it never accrues or
/// redeems loyalty points.
pub const WALK_IN_CUSTOMER_ID: &str = "cust_walk_in";
