//! # Payment Origin
//!
//! Every payment event funnels into one completion routine, but the flows
//! diverge in how amounts are applied and which entities move. The source
//! system told them apart with synthetic cart-item id prefixes
//! (`WO_DEPOSIT_*`, `SO_DEPOSIT`, ...) plus ambient "originating id" state
//! left over from screen navigation. Here the origin is an explicit tagged
//! union passed into the orchestrator - no markers, no side channels.

use serde::{Deserialize, Serialize};

/// Which flow a payment event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentOrigin {
    /// Walk-in sale of the cart as-is.
    PlainSale,
    /// Deposit taken when a sales order is opened.
    SalesOrderDeposit(String),
    /// Final payment settling a sales order; deducts the order's lines.
    SalesOrderBalance(String),
    /// Deposit against a work order (held as a customer-deposit liability).
    WorkOrderDeposit(String),
    /// Installment or final payment against a work order.
    WorkOrderBalance(String),
    /// Deposit opening payment on a layaway.
    LayawayDeposit(String),
    /// Subsequent layaway installment.
    LayawayInstallment(String),
}

impl PaymentOrigin {
    /// The sales order this payment belongs to, if any.
    pub fn sales_order_id(&self) -> Option<&str> {
        match self {
            PaymentOrigin::SalesOrderDeposit(id) | PaymentOrigin::SalesOrderBalance(id) => {
                Some(id)
            }
            _ => None,
        }
    }

    /// The work order this payment belongs to, if any.
    pub fn work_order_id(&self) -> Option<&str> {
        match self {
            PaymentOrigin::WorkOrderDeposit(id) | PaymentOrigin::WorkOrderBalance(id) => Some(id),
            _ => None,
        }
    }

    /// The layaway this payment belongs to, if any.
    pub fn layaway_id(&self) -> Option<&str> {
        match self {
            PaymentOrigin::LayawayDeposit(id) | PaymentOrigin::LayawayInstallment(id) => Some(id),
            _ => None,
        }
    }

    /// Deposit-style payments carry no goods; stock only moves on plain
    /// sales and on the payment that settles an order.
    pub fn is_deposit(&self) -> bool {
        matches!(
            self,
            PaymentOrigin::SalesOrderDeposit(_)
                | PaymentOrigin::WorkOrderDeposit(_)
                | PaymentOrigin::LayawayDeposit(_)
        )
    }
}
