//! # Shift Types & Reconciliation Math
//!
//! A shift owns the cash-float lifecycle for one operator at a time. This
//! module holds the entity and the pure closing arithmetic; the posting and
//! persistence choreography lives in the engine crate.
//!
//! ## Closing Formulae
//! ```text
//! breakdown[method]   = Σ payment.amount over the shift's sale payments
//! cash_change         = Σ sale.change over the shift's sales
//! net_cash_from_sales = breakdown[Cash] − cash_change
//! expected_in_drawer  = starting_float + net_cash_from_sales − payouts
//! cash_variance       = actual_in_drawer − expected_in_drawer
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Expense, PaymentMethod, Sale, SalePayment};

// =============================================================================
// Shift
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Active,
    /// Terminal. Closing twice would double-reverse the float posting, so
    /// every closing path gates on `Active` first.
    Closed,
}

/// One operator's drawer session.
///
/// Reconciliation fields are `None` while the shift is active and get
/// filled exactly once at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ShiftStatus,
    pub starting_float_cents: i64,
    pub total_sales_cents: i64,
    pub total_payouts_cents: i64,
    pub expected_cash_cents: Option<i64>,
    pub actual_cash_cents: Option<i64>,
    pub cash_variance_cents: Option<i64>,
    /// JSON map of payment method to cents, filled at close.
    pub payment_breakdown: Option<String>,
    /// Id of the float-clearing posting made at start, reversed at close.
    pub float_transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl Shift {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ShiftStatus::Active
    }

    #[inline]
    pub fn starting_float(&self) -> Money {
        Money::from_cents(self.starting_float_cents)
    }
}

// =============================================================================
// Shift Totals
// =============================================================================

/// The accumulators derived from a shift's sales and expenses at close.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftTotals {
    /// Cents tendered per payment method across all the shift's sales.
    pub breakdown: BTreeMap<PaymentMethod, i64>,
    pub total_sales_cents: i64,
    pub cash_change_cents: i64,
    pub total_payouts_cents: i64,
}

impl ShiftTotals {
    /// Folds the shift's sales (with their payments) and expenses into the
    /// closing accumulators.
    pub fn compute<'a, I>(sales: I, expenses: &[Expense]) -> Self
    where
        I: IntoIterator<Item = (&'a Sale, &'a [SalePayment])>,
    {
        let mut totals = ShiftTotals::default();

        for (sale, payments) in sales {
            totals.total_sales_cents += sale.total_cents;
            totals.cash_change_cents += sale.change_cents;
            for payment in payments {
                *totals.breakdown.entry(payment.method).or_insert(0) += payment.amount_cents;
            }
        }

        totals.total_payouts_cents = expenses.iter().map(|e| e.amount_cents).sum();
        totals
    }

    /// Cash taken over the counter net of change handed back.
    pub fn net_cash_from_sales(&self) -> Money {
        let cash = self.breakdown.get(&PaymentMethod::Cash).copied().unwrap_or(0);
        Money::from_cents(cash - self.cash_change_cents)
    }

    /// What should be in the drawer at close.
    pub fn expected_cash_in_drawer(&self, starting_float: Money) -> Money {
        starting_float + self.net_cash_from_sales() - Money::from_cents(self.total_payouts_cents)
    }
}

/// Over/short for the drawer count: positive means surplus cash.
#[inline]
pub fn cash_variance(actual: Money, expected: Money) -> Money {
    actual - expected
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(total: i64, change: i64) -> Sale {
        Sale {
            id: "sale_1".to_string(),
            receipt_number: "R-1".to_string(),
            customer_id: None,
            cashier_id: "user_1".to_string(),
            shift_id: "shift_1".to_string(),
            quotation_id: None,
            work_order_id: None,
            sales_order_id: None,
            layaway_id: None,
            total_cents: total,
            change_cents: change,
            tax_cents: 0,
            taxable_cents: total,
            grand_total_cents: None,
            deposit_applied_cents: None,
            balance_due_cents: None,
            points_earned: 0,
            points_used: 0,
            points_balance_after: None,
            created_at: Utc::now(),
        }
    }

    fn payment(method: PaymentMethod, amount: i64) -> SalePayment {
        SalePayment {
            id: "pay_1".to_string(),
            sale_id: "sale_1".to_string(),
            method,
            amount_cents: amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn breakdown_accumulates_per_method() {
        let s1 = sale(10_000, 0);
        let p1 = [payment(PaymentMethod::Cash, 6_000), payment(PaymentMethod::Mpesa, 4_000)];
        let s2 = sale(5_000, 0);
        let p2 = [payment(PaymentMethod::Cash, 5_000)];

        let totals = ShiftTotals::compute(
            [(&s1, p1.as_slice()), (&s2, p2.as_slice())],
            &[],
        );

        assert_eq!(totals.breakdown[&PaymentMethod::Cash], 11_000);
        assert_eq!(totals.breakdown[&PaymentMethod::Mpesa], 4_000);
        assert_eq!(totals.total_sales_cents, 15_000);
    }

    #[test]
    fn variance_formula() {
        // Float 1000.00, one cash sale of 100.00 paid with 150.00 (change
        // 50.00), payout of 20.00. Expected = 1000 + (150-50) - 20 = 1080.
        let s = sale(10_000, 5_000);
        let p = [payment(PaymentMethod::Cash, 15_000)];
        let expense = Expense {
            id: "exp_1".to_string(),
            shift_id: "shift_1".to_string(),
            description: "Courier".to_string(),
            amount_cents: 2_000,
            created_at: Utc::now(),
        };

        let totals = ShiftTotals::compute([(&s, p.as_slice())], &[expense]);
        assert_eq!(totals.net_cash_from_sales().cents(), 10_000);

        let expected = totals.expected_cash_in_drawer(Money::from_cents(100_000));
        assert_eq!(expected.cents(), 108_000);

        assert_eq!(
            cash_variance(Money::from_cents(107_500), expected).cents(),
            -500
        );
    }

    #[test]
    fn non_cash_methods_do_not_hit_the_drawer() {
        let s = sale(10_000, 0);
        let p = [payment(PaymentMethod::Card, 10_000)];
        let totals = ShiftTotals::compute([(&s, p.as_slice())], &[]);

        assert_eq!(totals.net_cash_from_sales().cents(), 0);
        assert_eq!(
            totals
                .expected_cash_in_drawer(Money::from_cents(50_000))
                .cents(),
            50_000
        );
    }
}
