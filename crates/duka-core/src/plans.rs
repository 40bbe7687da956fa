//! # Deferred Payment Plans
//!
//! Layaway, Work Order and Sales Order: three independent but structurally
//! similar state machines, each tracking "total, amount applied so far,
//! derived balance, status". Every one of them resolves into the same sale
//! completion path; this module owns the entities and their transition
//! rules, the engine owns the choreography.
//!
//! ## Shared Shape
//! ```text
//! ┌──────────────┬───────────────┬────────────────┬────────────────────┐
//! │              │ total         │ applied        │ completed when     │
//! ├──────────────┼───────────────┼────────────────┼────────────────────┤
//! │ Layaway      │ total_cents   │ Σ payments     │ balance ≤ 0        │
//! │ WorkOrder    │ total_cost    │ amount_paid    │ balance_due ≤ 0    │
//! │ SalesOrder   │ total_cents   │ deposit + bal. │ final payment      │
//! └──────────────┴───────────────┴────────────────┴────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Layaway
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LayawayStatus {
    Active,
    Completed,
    /// Terminal: operator wrote the plan off after missed installments.
    Defaulted,
    Cancelled,
}

/// Goods held against installment payments.
///
/// Invariant: `balance_cents == total_cents − Σ payments.amount_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Layaway {
    pub id: String,
    pub customer_id: String,
    pub total_cents: i64,
    pub balance_cents: i64,
    pub status: LayawayStatus,
    pub created_at: DateTime<Utc>,
}

/// One installment against a layaway; appended per payment, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LayawayPayment {
    pub id: String,
    pub layaway_id: String,
    /// The sale record the installment was taken through.
    pub sale_id: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Layaway {
    /// Applies a deposit or installment. Transitions to Completed when the
    /// balance reaches zero; terminal states refuse further payments.
    pub fn apply_payment(&mut self, amount: Money) -> CoreResult<()> {
        if self.status != LayawayStatus::Active {
            return Err(CoreError::PlanClosed {
                plan: "Layaway",
                id: self.id.clone(),
                status: format!("{:?}", self.status),
            });
        }
        self.balance_cents -= amount.cents();
        if self.balance_cents <= 0 {
            self.status = LayawayStatus::Completed;
        }
        Ok(())
    }

    pub fn cancel(&mut self) -> CoreResult<()> {
        self.transition_terminal(LayawayStatus::Cancelled)
    }

    pub fn mark_defaulted(&mut self) -> CoreResult<()> {
        self.transition_terminal(LayawayStatus::Defaulted)
    }

    fn transition_terminal(&mut self, to: LayawayStatus) -> CoreResult<()> {
        if self.status != LayawayStatus::Active {
            return Err(CoreError::InvalidTransition {
                entity: "Layaway",
                from: format!("{:?}", self.status),
                to: format!("{:?}", to),
            });
        }
        self.status = to;
        Ok(())
    }
}

// =============================================================================
// Work Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Pending,
    InProgress,
    AwaitingParts,
    ReadyForPickup,
    /// Not permitted while `balance_due_cents > 0`.
    Completed,
    Delivered,
    Cancelled,
}

/// A repair/service job with a bill of materials and staged payments.
///
/// Invariant: `balance_due_cents == total_cost_cents − amount_paid_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkOrder {
    pub id: String,
    pub customer_id: String,
    pub description: String,
    pub total_cost_cents: i64,
    pub amount_paid_cents: i64,
    pub balance_due_cents: i64,
    pub status: WorkOrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One bill-of-materials line, owned by its work order and looked up by
/// foreign key (no embedding) so un-reservation on cancel is a simple
/// filter over `work_order_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WorkOrderMaterial {
    pub id: String,
    pub work_order_id: String,
    pub product_id: String,
    pub quantity: i64,
}

impl WorkOrder {
    /// Whether the order can still take money.
    pub fn accepts_payment(&self) -> bool {
        !matches!(
            self.status,
            WorkOrderStatus::Completed | WorkOrderStatus::Delivered | WorkOrderStatus::Cancelled
        )
    }

    /// Applies a deposit or balance payment and recomputes the balance.
    ///
    /// Returns `true` when this payment settled the order (the order
    /// transitions to Completed on that payment and not before).
    pub fn apply_payment(&mut self, amount: Money) -> CoreResult<bool> {
        if !self.accepts_payment() {
            return Err(CoreError::PlanClosed {
                plan: "WorkOrder",
                id: self.id.clone(),
                status: format!("{:?}", self.status),
            });
        }
        self.amount_paid_cents += amount.cents();
        self.balance_due_cents = self.total_cost_cents - self.amount_paid_cents;

        if self.balance_due_cents <= 0 {
            self.status = WorkOrderStatus::Completed;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Explicit status change. Rejects Completed while money is owed;
    /// payments are the only path that settles the balance.
    pub fn set_status(&mut self, to: WorkOrderStatus) -> CoreResult<()> {
        if to == WorkOrderStatus::Completed && self.balance_due_cents > 0 {
            return Err(CoreError::BalanceStillDue {
                id: self.id.clone(),
                balance_due_cents: self.balance_due_cents,
            });
        }
        if self.status == WorkOrderStatus::Cancelled {
            return Err(CoreError::InvalidTransition {
                entity: "WorkOrder",
                from: "Cancelled".to_string(),
                to: format!("{:?}", to),
            });
        }
        self.status = to;
        Ok(())
    }
}

// =============================================================================
// Sales Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    Pending,
    /// A purchase order has been raised covering all pending lines.
    Ordered,
    PartiallyReceived,
    Received,
    Completed,
    Cancelled,
}

/// A customer order fulfilled later, taken with a deposit up front.
///
/// Invariant: `balance_cents == total_cents − deposit_cents` at creation;
/// the final payment drives it to 0 and the status to Completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesOrder {
    pub id: String,
    pub customer_id: String,
    pub total_cents: i64,
    pub deposit_cents: i64,
    pub balance_cents: i64,
    pub status: SalesOrderStatus,
    pub created_at: DateTime<Utc>,
}

/// A sales-order line; `quantity_received` advances as purchase-order
/// receipts land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesOrderItem {
    pub id: String,
    pub sales_order_id: String,
    /// None for unlinked free-text lines; only linked lines move stock.
    pub product_id: Option<String>,
    pub name_snapshot: String,
    pub quantity: i64,
    pub quantity_received: i64,
    pub unit_price_cents: i64,
}

impl SalesOrder {
    pub fn accepts_payment(&self) -> bool {
        !matches!(
            self.status,
            SalesOrderStatus::Completed | SalesOrderStatus::Cancelled
        )
    }

    /// The final payment: zeroes the balance and completes the order.
    pub fn settle_balance(&mut self) -> CoreResult<()> {
        if !self.accepts_payment() {
            return Err(CoreError::PlanClosed {
                plan: "SalesOrder",
                id: self.id.clone(),
                status: format!("{:?}", self.status),
            });
        }
        self.balance_cents = 0;
        self.status = SalesOrderStatus::Completed;
        Ok(())
    }

    /// Pending → Ordered, once a purchase order covers the lines.
    pub fn mark_ordered(&mut self) -> CoreResult<()> {
        if self.status != SalesOrderStatus::Pending {
            return Err(CoreError::InvalidTransition {
                entity: "SalesOrder",
                from: format!("{:?}", self.status),
                to: "Ordered".to_string(),
            });
        }
        self.status = SalesOrderStatus::Ordered;
        Ok(())
    }

    pub fn cancel(&mut self) -> CoreResult<()> {
        if matches!(
            self.status,
            SalesOrderStatus::Completed | SalesOrderStatus::Cancelled
        ) {
            return Err(CoreError::InvalidTransition {
                entity: "SalesOrder",
                from: format!("{:?}", self.status),
                to: "Cancelled".to_string(),
            });
        }
        self.status = SalesOrderStatus::Cancelled;
        Ok(())
    }
}

/// Derives the receipt status from the order's lines after a goods receipt.
pub fn receipt_status(items: &[SalesOrderItem]) -> SalesOrderStatus {
    // An order with no lines has received nothing
    if items.is_empty() {
        return SalesOrderStatus::Ordered;
    }
    let fully = items.iter().all(|i| i.quantity_received >= i.quantity);
    if fully {
        SalesOrderStatus::Received
    } else if items.iter().any(|i| i.quantity_received > 0) {
        SalesOrderStatus::PartiallyReceived
    } else {
        SalesOrderStatus::Ordered
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
