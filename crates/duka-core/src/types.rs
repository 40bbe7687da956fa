//! # Domain Types
//!
//! Core domain types shared across Duka POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                               │
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐               │
//! │  │   Product    │  │     Sale     │  │ SalePayment  │               │
//! │  │ ───────────  │  │ ───────────  │  │ ───────────  │               │
//! │  │ stock        │  │ total_cents  │  │ method       │               │
//! │  │ reserved     │  │ tax_cents    │  │ amount_cents │               │
//! │  │ cost/price   │  │ origin ids   │  └──────────────┘               │
//! │  └──────────────┘  └──────────────┘                                 │
//! │                                                                     │
//! │  Deferred plans (Layaway/WorkOrder/SalesOrder) live in `plans`;     │
//! │  ledger types (Account/JournalEntry/Transaction) live in `ledger`.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All monetary fields are integer cents (`*_cents: i64`); `Money` is the
//! arithmetic type, the structs are the storage shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// Whether a product occupies shelf space or is pure labour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Physical goods; tracked by the stock ledger.
    Inventory,
    /// Services; never touch stock or reservations.
    Service,
}

/// A product, carrying both stock-ledger counters.
///
/// ## Stock Ledger Invariants
/// - `reserved_stock >= 0` always
/// - `stock - reserved_stock >= 0` is required before a reservation is
///   granted (available-to-sell must cover the commitment)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub product_type: ProductType,
    /// Selling price in cents (VAT inclusive).
    pub price_cents: i64,
    /// Cost in cents, used for the COGS posting.
    pub cost_price_cents: i64,
    /// Owned units on hand.
    pub stock: i64,
    /// Units committed to unfulfilled orders but not yet deducted.
    pub reserved_stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_inventory(&self) -> bool {
        self.product_type == ProductType::Inventory
    }

    /// Units available to sell or reserve: owned minus committed.
    #[inline]
    pub fn available(&self) -> i64 {
        self.stock - self.reserved_stock
    }

    /// Commits `qty` units to an order. Services pass through untouched.
    ///
    /// Fails when available-to-sell cannot cover the reservation; callers
    /// reserving multi-line material lists must treat any line failure as
    /// aborting the whole operation.
    pub fn reserve(&mut self, qty: i64) -> CoreResult<()> {
        if !self.is_inventory() {
            return Ok(());
        }
        if self.available() < qty {
            return Err(CoreError::InsufficientStock {
                product_id: self.id.clone(),
                available: self.available(),
                requested: qty,
            });
        }
        self.reserved_stock += qty;
        Ok(())
    }

    /// Releases a reservation, floored at zero (double-release safe).
    pub fn release(&mut self, qty: i64) {
        if self.is_inventory() {
            self.reserved_stock = (self.reserved_stock - qty).max(0);
        }
    }

    /// Deducts owned units for a plain sale. Never touches reservations.
    ///
    /// Rejects a deduction that would drive `stock` negative; backorders
    /// are represented as sales orders, not negative stock.
    pub fn deduct(&mut self, qty: i64) -> CoreResult<()> {
        if !self.is_inventory() {
            return Ok(());
        }
        if self.stock < qty {
            return Err(CoreError::InsufficientStock {
                product_id: self.id.clone(),
                available: self.stock,
                requested: qty,
            });
        }
        self.stock -= qty;
        Ok(())
    }

    /// Deducts units that were previously reserved (sales-order or
    /// work-order fulfilment): both counters move together.
    pub fn deduct_reserved(&mut self, qty: i64) -> CoreResult<()> {
        self.deduct(qty)?;
        self.release(qty);
        Ok(())
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer, carrying the loyalty points running balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub loyalty_points: i64,
    /// The anonymous walk-in customer never accrues or redeems points.
    pub is_walk_in: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a payment was tendered. Each method maps to one asset account in
/// the account mapping configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
    Card,
    BankTransfer,
}

// =============================================================================
// Sale
// =============================================================================

/// An immutable receipt record, created exactly once per completion call.
///
/// Origin ids (`work_order_id`, `sales_order_id`, `layaway_id`,
/// `quotation_id`) stamp which deferred-payment flow produced the sale, if
/// any. Totals are VAT-inclusive; `taxable_cents + tax_cents == total_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub customer_id: Option<String>,
    pub cashier_id: String,
    pub shift_id: String,
    pub quotation_id: Option<String>,
    pub work_order_id: Option<String>,
    pub sales_order_id: Option<String>,
    pub layaway_id: Option<String>,
    pub total_cents: i64,
    pub change_cents: i64,
    pub tax_cents: i64,
    pub taxable_cents: i64,
    /// For order completions: the full order value being settled.
    pub grand_total_cents: Option<i64>,
    /// For order completions: deposit previously held against the order.
    pub deposit_applied_cents: Option<i64>,
    /// For partial plan payments: what remains owed after this sale.
    pub balance_due_cents: Option<i64>,
    pub points_earned: i64,
    pub points_used: i64,
    pub points_balance_after: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A line item on a sale. Product data is frozen at sale time (snapshot
/// pattern) so receipts survive later product edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// None for synthetic plan-payment lines (deposit/installment).
    pub product_id: Option<String>,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Cost at sale time, feeding the COGS posting.
    pub cost_price_cents: i64,
    pub line_total_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A payment towards a sale. Split tender means several rows per sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SalePayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Quotation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    /// Set when a sale completes against this quotation.
    Invoiced,
    Expired,
}

/// A priced offer; converting it to a sale marks it Invoiced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Quotation {
    pub id: String,
    pub customer_id: Option<String>,
    pub total_cents: i64,
    pub status: QuotationStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

/// A cash payout during a shift; feeds `total_payouts` at reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: String,
    pub shift_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Entry
// =============================================================================

/// Append-only audit trail row. The viewer UI is out of scope; the core
/// writes the rows it would read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON details blob.
    pub details: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_product(stock: i64, reserved: i64) -> Product {
        Product {
            id: "prod_1".to_string(),
            sku: "SKU-1".to_string(),
            name: "Test Product".to_string(),
            product_type: ProductType::Inventory,
            price_cents: 10_000,
            cost_price_cents: 5_000,
            stock,
            reserved_stock: reserved,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reserve_respects_available() {
        let mut p = inventory_product(10, 4);
        assert_eq!(p.available(), 6);

        p.reserve(6).unwrap();
        assert_eq!(p.reserved_stock, 10);

        let err = p.reserve(1).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 0, .. }));
    }

    #[test]
    fn release_floors_at_zero() {
        let mut p = inventory_product(10, 2);
        p.release(5); // double-release defence
        assert_eq!(p.reserved_stock, 0);
    }

    #[test]
    fn deduct_rejects_negative_stock() {
        let mut p = inventory_product(3, 0);
        p.deduct(3).unwrap();
        assert_eq!(p.stock, 0);

        let err = p.deduct(1).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
    }

    #[test]
    fn deduct_reserved_moves_both_counters() {
        let mut p = inventory_product(10, 4);
        p.deduct_reserved(4).unwrap();
        assert_eq!(p.stock, 6);
        assert_eq!(p.reserved_stock, 0);
    }

    #[test]
    fn plain_deduct_never_touches_reservations() {
        let mut p = inventory_product(10, 4);
        p.deduct(2).unwrap();
        assert_eq!(p.stock, 8);
        assert_eq!(p.reserved_stock, 4);
    }

    #[test]
    fn services_bypass_the_stock_ledger() {
        let mut p = inventory_product(0, 0);
        p.product_type = ProductType::Service;

        p.reserve(100).unwrap();
        p.deduct(100).unwrap();
        assert_eq!(p.stock, 0);
        assert_eq!(p.reserved_stock, 0);
    }
}
