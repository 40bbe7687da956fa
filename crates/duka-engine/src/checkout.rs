//! # Sale Completion Orchestrator
//!
//! Every payment event in the system - plain sales, quotation conversions,
//! order deposits, installments, settlements - funnels through
//! [`Checkout::complete_sale`]. There is no other path that creates a sale,
//! moves stock for a sale, or posts sale revenue.
//!
//! ## The Completion Pipeline
//! ```text
//! CheckoutRequest { lines, tenders, points, origin, ... }
//!       │
//!       ▼
//! 1  active-shift gate (no drawer, no sale)
//! 2  arithmetic: total, points value, change; overpay/underpay guards
//!    ┌──────────────── ONE SQL TRANSACTION ────────────────────────────┐
//! 3  │ stock movement per origin:                                      │
//!    │   PlainSale           deduct cart lines                         │
//!    │   SalesOrderBalance   deduct the order's reserved lines         │
//!    │   WorkOrderBalance    deduct reserved materials on settlement   │
//!    │   deposits            no goods move                             │
//! 4  │ loyalty ledger (never for the walk-in customer)                 │
//! 5  │ plan transition (apply_payment / settle_balance) + save         │
//! 6  │ quotation → Invoiced                                            │
//! 7  │ ledger posting (see shapes below; skipped whole when the        │
//!    │ account mapping is incomplete)                                  │
//! 8  │ persist sale + items + payments (+ layaway payment row)         │
//! 9  │ audit entry                                                     │
//!    └──────── any error → rollback, nothing happened ─────────────────┘
//! 10 return CompletedSale
//! ```
//!
//! ## Posting Shapes
//! ```text
//! standard (plain sale, layaway payment):
//!     Dr  tender accounts (cash net of change)
//!     Dr  Sales (points-funded value, if any)
//!     Cr  Sales            taxable portion
//!     Cr  VAT Payable      tax portion
//!     Dr  COGS / Cr Inventory   (when goods moved)
//!
//! deposit / non-settling order payment:
//!     Dr  tender accounts        Cr  Customer Deposits
//!
//! settlement (final order payment):
//!     Dr  Customer Deposits      (everything previously held)
//!     Dr  tender accounts        (this payment)
//!     Cr  Sales + VAT Payable    (the full order value)
//!     Dr  COGS / Cr Inventory
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::poster::LedgerPoster;
use crate::settings::EngineSettings;
use duka_core::{
    CoreError, JournalEntry, Money, PaymentMethod, PaymentOrigin, QuotationStatus, ReferenceType,
    Sale, SaleItem, SalePayment,
};
use duka_db::Database;

// =============================================================================
// Request / Response Types
// =============================================================================

/// One cart line. `product_id` is None for synthetic plan-payment lines
/// ("Work order deposit"), which never move stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CheckoutLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// One tendered payment; split tender is a Vec of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tender {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// Everything the orchestrator needs, passed explicitly. The payment's
/// origin is the tagged union - no marker ids, no ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub tenders: Vec<Tender>,
    pub points_used: i64,
    pub customer_id: Option<String>,
    pub cashier_id: String,
    pub origin: PaymentOrigin,
    pub quotation_id: Option<String>,
}

/// The persisted result of one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
}

/// Plan-flow context resolved inside the transaction, folded into the
/// sale record and the posting choice.
#[derive(Debug, Default)]
struct OriginOutcome {
    grand_total_cents: Option<i64>,
    deposit_applied_cents: Option<i64>,
    balance_due_cents: Option<i64>,
    /// Cents previously held as Customer Deposits, released on settlement.
    prior_held_cents: i64,
    settled_order: bool,
}

// =============================================================================
// Checkout
// =============================================================================

/// The sale completion orchestrator.
#[derive(Debug, Clone)]
pub struct Checkout {
    db: Database,
    poster: LedgerPoster,
    settings: EngineSettings,
}

impl Checkout {
    /// Creates a new Checkout service.
    pub fn new(db: Database, settings: EngineSettings) -> Self {
        let poster = LedgerPoster::new(db.clone());
        Checkout {
            db,
            poster,
            settings,
        }
    }

    /// Completes one payment event. See the module docs for the pipeline.
    pub async fn complete_sale(&self, request: CheckoutRequest) -> EngineResult<CompletedSale> {
        if request.lines.is_empty() {
            return Err(EngineError::InvalidRequest("Cart is empty".to_string()));
        }
        if request.points_used < 0 {
            return Err(EngineError::InvalidRequest(
                "points_used cannot be negative".to_string(),
            ));
        }
        if request.points_used > 0 && request.origin != PaymentOrigin::PlainSale {
            return Err(EngineError::InvalidRequest(
                "Points can only fund plain sales".to_string(),
            ));
        }

        // ---- Step 1: no active shift, no sale --------------------------------
        let shift = self
            .db
            .shifts()
            .active_for_user(&request.cashier_id)
            .await?
            .ok_or(EngineError::Core(CoreError::NoActiveShift))?;

        // ---- Step 2: arithmetic ----------------------------------------------
        let total: Money = request.lines.iter().map(|l| l.line_total()).sum();
        let points_value =
            Money::from_cents(request.points_used * self.settings.loyalty.redeem_cents_per_point);
        let tender_total: Money = request.tenders.iter().map(|t| t.amount).sum();
        let paid = tender_total + points_value;

        if paid.cents() < total.cents() {
            return Err(EngineError::Core(CoreError::InvalidPayment {
                reason: format!("Paid {paid} against a total of {total}"),
            }));
        }
        let change = paid - total;
        let cash_tendered: Money = request
            .tenders
            .iter()
            .filter(|t| t.method == PaymentMethod::Cash)
            .map(|t| t.amount)
            .sum();
        if change.cents() > cash_tendered.cents() {
            return Err(EngineError::Core(CoreError::InvalidPayment {
                reason: format!("Change {change} exceeds cash tendered {cash_tendered}"),
            }));
        }

        // Receipt numbers derive from the all-time sale count (pool read,
        // before the transaction takes the connection).
        let receipt_number = format!("RCT-{:06}", self.db.sales().count().await? + 1);
        let sale_id = Uuid::new_v4().to_string();

        // ---- Steps 3-9: one SQL transaction ----------------------------------
        let mut tx = self.db.begin().await?;

        let (cogs, item_costs) = self
            .move_stock(&mut tx, &request, total)
            .await?;

        let outcome = self.settle_origin(&mut tx, &request, total).await?;

        let points_balance_after = self
            .apply_loyalty(&mut tx, &request, total, &outcome)
            .await?;
        let points_earned = match points_balance_after {
            Some(_) => self.points_earned(total, &outcome),
            None => 0,
        };

        if let Some(quotation_id) = &request.quotation_id {
            self.db
                .quotations()
                .set_status(&mut tx, quotation_id, QuotationStatus::Invoiced)
                .await?;
        }

        self.post_for_origin(&mut tx, &request, &sale_id, total, change, points_value, cogs, &outcome)
            .await?;

        let sale = Sale {
            id: sale_id.clone(),
            receipt_number,
            customer_id: request.customer_id.clone(),
            cashier_id: request.cashier_id.clone(),
            shift_id: shift.id.clone(),
            quotation_id: request.quotation_id.clone(),
            work_order_id: request.origin.work_order_id().map(str::to_string),
            sales_order_id: request.origin.sales_order_id().map(str::to_string),
            layaway_id: request.origin.layaway_id().map(str::to_string),
            total_cents: total.cents(),
            change_cents: change.cents(),
            tax_cents: total.vat_portion(self.settings.tax_rate).cents(),
            taxable_cents: total.taxable_portion(self.settings.tax_rate).cents(),
            grand_total_cents: outcome.grand_total_cents,
            deposit_applied_cents: outcome.deposit_applied_cents,
            balance_due_cents: outcome.balance_due_cents,
            points_earned,
            points_used: request.points_used,
            points_balance_after,
            created_at: Utc::now(),
        };

        let items: Vec<SaleItem> = request
            .lines
            .iter()
            .zip(item_costs)
            .map(|(line, cost_cents)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                quantity: line.quantity,
                cost_price_cents: cost_cents,
                line_total_cents: line.line_total().cents(),
            })
            .collect();

        let payments: Vec<SalePayment> = request
            .tenders
            .iter()
            .map(|tender| SalePayment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                method: tender.method,
                amount_cents: tender.amount.cents(),
                created_at: Utc::now(),
            })
            .collect();

        self.db.sales().insert(&mut tx, &sale, &items, &payments).await?;

        if let Some(layaway_id) = request.origin.layaway_id() {
            self.db
                .layaways()
                .insert_payment(
                    &mut tx,
                    &duka_core::LayawayPayment {
                        id: Uuid::new_v4().to_string(),
                        layaway_id: layaway_id.to_string(),
                        sale_id: sale_id.clone(),
                        amount_cents: total.cents(),
                        created_at: Utc::now(),
                    },
                )
                .await?;
        }

        self.db
            .audit()
            .record(
                &mut tx,
                "sale_completed",
                "sale",
                &sale_id,
                json!({
                    "origin": request.origin,
                    "total_cents": total.cents(),
                    "change_cents": change.cents(),
                }),
                &request.cashier_id,
            )
            .await?;

        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            total_cents = sale.total_cents,
            "Sale completed"
        );

        Ok(CompletedSale {
            sale,
            items,
            payments,
        })
    }

    // -------------------------------------------------------------------------
    // Step 3: stock movement
    // -------------------------------------------------------------------------

    /// Moves stock for the request's origin and returns the COGS total plus
    /// per-line cost snapshots (index-aligned with `request.lines`).
    async fn move_stock(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        total: Money,
    ) -> EngineResult<(Money, Vec<i64>)> {
        let mut cogs = Money::zero();
        let mut item_costs = vec![0i64; request.lines.len()];

        match &request.origin {
            // Plain sales (incl. quotation conversions) deduct owned stock.
            PaymentOrigin::PlainSale => {
                for (idx, line) in request.lines.iter().enumerate() {
                    let Some(product_id) = &line.product_id else {
                        continue;
                    };
                    let mut product = self.db.products().fetch(&mut *conn, product_id).await?;
                    product.deduct(line.quantity)?;
                    self.db.products().save_stock(&mut *conn, &product).await?;
                    item_costs[idx] = product.cost_price_cents;
                    cogs += Money::from_cents(product.cost_price_cents) * line.quantity;
                }
            }

            // The settling payment on a sales order deducts the lines that
            // were reserved when the order was opened.
            PaymentOrigin::SalesOrderBalance(order_id) => {
                let items = self.db.sales_orders().items_for_tx(&mut *conn, order_id).await?;
                for item in items.iter().filter(|i| i.product_id.is_some()) {
                    let product_id = item.product_id.as_deref().unwrap_or_default();
                    let mut product = self.db.products().fetch(&mut *conn, product_id).await?;
                    product.deduct_reserved(item.quantity)?;
                    self.db.products().save_stock(&mut *conn, &product).await?;
                    cogs += Money::from_cents(product.cost_price_cents) * item.quantity;
                }
            }

            // Work order materials only move when the payment settles the
            // order; an installment that leaves a balance moves nothing.
            PaymentOrigin::WorkOrderBalance(order_id) => {
                let order = self.db.work_orders().fetch(&mut *conn, order_id).await?;
                let settles = order.balance_due_cents <= total.cents();
                if settles {
                    let materials =
                        self.db.work_orders().materials_for_tx(&mut *conn, order_id).await?;
                    for material in &materials {
                        let mut product =
                            self.db.products().fetch(&mut *conn, &material.product_id).await?;
                        product.deduct_reserved(material.quantity)?;
                        self.db.products().save_stock(&mut *conn, &product).await?;
                        cogs += Money::from_cents(product.cost_price_cents) * material.quantity;
                    }
                }
            }

            // Deposits and layaway installments carry no goods.
            PaymentOrigin::SalesOrderDeposit(_)
            | PaymentOrigin::WorkOrderDeposit(_)
            | PaymentOrigin::LayawayDeposit(_)
            | PaymentOrigin::LayawayInstallment(_) => {}
        }

        Ok((cogs, item_costs))
    }

    // -------------------------------------------------------------------------
    // Step 5: plan transitions
    // -------------------------------------------------------------------------

    /// Applies the payment to its plan (if any) and persists the transition.
    async fn settle_origin(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        total: Money,
    ) -> EngineResult<OriginOutcome> {
        let mut outcome = OriginOutcome::default();

        match &request.origin {
            PaymentOrigin::PlainSale => {}

            PaymentOrigin::LayawayDeposit(id) | PaymentOrigin::LayawayInstallment(id) => {
                let mut layaway = self.db.layaways().fetch(&mut *conn, id).await?;
                layaway.apply_payment(total)?;
                self.db.layaways().save(&mut *conn, &layaway).await?;
                outcome.grand_total_cents = Some(layaway.total_cents);
                outcome.balance_due_cents = Some(layaway.balance_cents);
            }

            PaymentOrigin::WorkOrderDeposit(id) => {
                let mut order = self.db.work_orders().fetch(&mut *conn, id).await?;
                order.apply_payment(total)?;
                self.db.work_orders().save(&mut *conn, &order).await?;
                outcome.grand_total_cents = Some(order.total_cost_cents);
                outcome.balance_due_cents = Some(order.balance_due_cents);
            }

            PaymentOrigin::WorkOrderBalance(id) => {
                let mut order = self.db.work_orders().fetch(&mut *conn, id).await?;
                let prior_paid = order.amount_paid_cents;
                let settled = order.apply_payment(total)?;
                self.db.work_orders().save(&mut *conn, &order).await?;
                outcome.grand_total_cents = Some(order.total_cost_cents);
                outcome.balance_due_cents = Some(order.balance_due_cents.max(0));
                outcome.prior_held_cents = prior_paid;
                outcome.settled_order = settled;
                if settled {
                    outcome.deposit_applied_cents = Some(prior_paid);
                }
            }

            PaymentOrigin::SalesOrderDeposit(id) => {
                let order = self.db.sales_orders().fetch(&mut *conn, id).await?;
                if !order.accepts_payment() {
                    return Err(EngineError::Core(CoreError::PlanClosed {
                        plan: "SalesOrder",
                        id: order.id.clone(),
                        status: format!("{:?}", order.status),
                    }));
                }
                // The deposit amount was recorded at creation; this payment
                // is the money event for it.
                outcome.grand_total_cents = Some(order.total_cents);
                outcome.balance_due_cents = Some(order.balance_cents);
            }

            PaymentOrigin::SalesOrderBalance(id) => {
                let mut order = self.db.sales_orders().fetch(&mut *conn, id).await?;
                let deposit = order.deposit_cents;
                order.settle_balance()?;
                self.db.sales_orders().save(&mut *conn, &order).await?;
                outcome.grand_total_cents = Some(order.total_cents);
                outcome.deposit_applied_cents = Some(deposit);
                outcome.balance_due_cents = Some(0);
                outcome.prior_held_cents = deposit;
                outcome.settled_order = true;
            }
        }

        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Step 4: loyalty
    // -------------------------------------------------------------------------

    fn points_earned(&self, total: Money, outcome: &OriginOutcome) -> i64 {
        if !self.settings.loyalty.enabled || self.settings.loyalty.earn_cents_per_point <= 0 {
            return 0;
        }
        // On a settlement the customer ultimately spent the whole order
        // value; earlier deposit payments earned nothing.
        let basis = total.cents() + outcome.deposit_applied_cents.unwrap_or(0);
        basis / self.settings.loyalty.earn_cents_per_point
    }

    /// Updates the customer's running balance; returns the new balance, or
    /// None when no loyalty applies (walk-in, anonymous, disabled).
    async fn apply_loyalty(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        total: Money,
        outcome: &OriginOutcome,
    ) -> EngineResult<Option<i64>> {
        let Some(customer_id) = &request.customer_id else {
            if request.points_used > 0 {
                return Err(EngineError::Core(CoreError::InvalidPayment {
                    reason: "Points require a customer".to_string(),
                }));
            }
            return Ok(None);
        };

        let customer = self.db.customers().fetch(&mut *conn, customer_id).await?;
        if customer.is_walk_in || !self.settings.loyalty.enabled {
            if request.points_used > 0 {
                return Err(EngineError::Core(CoreError::InvalidPayment {
                    reason: "This customer cannot redeem points".to_string(),
                }));
            }
            return Ok(None);
        }
        if request.points_used > customer.loyalty_points {
            return Err(EngineError::Core(CoreError::InvalidPayment {
                reason: format!(
                    "Customer holds {} points, {} requested",
                    customer.loyalty_points, request.points_used
                ),
            }));
        }

        let earned = self.points_earned(total, outcome);
        let new_balance = customer.loyalty_points - request.points_used + earned;
        self.db
            .customers()
            .save_points(&mut *conn, customer_id, new_balance)
            .await?;
        Ok(Some(new_balance))
    }

    // -------------------------------------------------------------------------
    // Step 7: ledger posting
    // -------------------------------------------------------------------------

    /// Tender debits aggregated per method, with change netted off cash.
    /// Returns None when any needed account is unmapped.
    fn tender_debits(&self, tenders: &[Tender], change: Money) -> Option<Vec<JournalEntry>> {
        let mut per_method: BTreeMap<PaymentMethod, Money> = BTreeMap::new();
        for tender in tenders {
            *per_method.entry(tender.method).or_insert(Money::zero()) += tender.amount;
        }
        if let Some(cash) = per_method.get_mut(&PaymentMethod::Cash) {
            *cash -= change;
        }

        let mut entries = Vec::new();
        for (method, amount) in per_method {
            if amount.is_zero() {
                continue;
            }
            let account = self.settings.accounts.for_method(method)?;
            entries.push(JournalEntry::debit(account, amount));
        }
        Some(entries)
    }

    #[allow(clippy::too_many_arguments)]
    async fn post_for_origin(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        sale_id: &str,
        total: Money,
        change: Money,
        points_value: Money,
        cogs: Money,
        outcome: &OriginOutcome,
    ) -> EngineResult<()> {
        let entries = match &request.origin {
            // Revenue recognized now: plain sales, and layaway payments
            // (layaway revenue is recognized per installment).
            PaymentOrigin::PlainSale
            | PaymentOrigin::LayawayDeposit(_)
            | PaymentOrigin::LayawayInstallment(_) => {
                self.revenue_entries(request, total, change, points_value, cogs)
            }

            // Money held against an unfinished order is a liability.
            PaymentOrigin::WorkOrderDeposit(_) | PaymentOrigin::SalesOrderDeposit(_) => {
                self.deposit_entries(request, total, change)
            }

            PaymentOrigin::WorkOrderBalance(_) | PaymentOrigin::SalesOrderBalance(_) => {
                if outcome.settled_order {
                    self.settlement_entries(request, total, change, cogs, outcome)
                } else {
                    // An installment that leaves a balance is held like a
                    // deposit; settlement releases it all at once.
                    self.deposit_entries(request, total, change)
                }
            }
        };

        match entries {
            Some(entries) => {
                let reference_type = match &request.origin {
                    PaymentOrigin::PlainSale => ReferenceType::Sale,
                    PaymentOrigin::LayawayDeposit(_) | PaymentOrigin::LayawayInstallment(_) => {
                        ReferenceType::Layaway
                    }
                    PaymentOrigin::WorkOrderDeposit(_) | PaymentOrigin::WorkOrderBalance(_) => {
                        ReferenceType::WorkOrder
                    }
                    PaymentOrigin::SalesOrderDeposit(_) | PaymentOrigin::SalesOrderBalance(_) => {
                        ReferenceType::SalesOrder
                    }
                };
                self.poster
                    .post(
                        conn,
                        format!("Sale {sale_id}"),
                        sale_id.to_string(),
                        reference_type,
                        entries,
                    )
                    .await?;
            }
            None => {
                warn!(
                    sale_id = %sale_id,
                    "Account mapping incomplete; skipping ledger posting"
                );
            }
        }
        Ok(())
    }

    fn revenue_entries(
        &self,
        request: &CheckoutRequest,
        total: Money,
        change: Money,
        points_value: Money,
        cogs: Money,
    ) -> Option<Vec<JournalEntry>> {
        let sales = self.settings.accounts.sales.as_deref()?;
        let vat = self.settings.accounts.vat_payable.as_deref()?;

        let mut entries = self.tender_debits(&request.tenders, change)?;
        if points_value.is_positive() {
            // Loyalty-funded value comes out of revenue.
            entries.push(JournalEntry::debit(sales, points_value));
        }
        entries.push(JournalEntry::credit(
            sales,
            total.taxable_portion(self.settings.tax_rate),
        ));
        let tax = total.vat_portion(self.settings.tax_rate);
        if tax.is_positive() {
            entries.push(JournalEntry::credit(vat, tax));
        }

        if cogs.is_positive() {
            let cogs_acc = self.settings.accounts.cogs.as_deref()?;
            let inventory = self.settings.accounts.inventory.as_deref()?;
            entries.push(JournalEntry::debit(cogs_acc, cogs));
            entries.push(JournalEntry::credit(inventory, cogs));
        }
        Some(entries)
    }

    fn deposit_entries(
        &self,
        request: &CheckoutRequest,
        total: Money,
        change: Money,
    ) -> Option<Vec<JournalEntry>> {
        let deposits = self.settings.accounts.customer_deposits.as_deref()?;
        let mut entries = self.tender_debits(&request.tenders, change)?;
        entries.push(JournalEntry::credit(deposits, total));
        Some(entries)
    }

    fn settlement_entries(
        &self,
        request: &CheckoutRequest,
        total: Money,
        change: Money,
        cogs: Money,
        outcome: &OriginOutcome,
    ) -> Option<Vec<JournalEntry>> {
        let sales = self.settings.accounts.sales.as_deref()?;
        let vat = self.settings.accounts.vat_payable.as_deref()?;
        let deposits = self.settings.accounts.customer_deposits.as_deref()?;

        let mut entries = self.tender_debits(&request.tenders, change)?;
        let prior_held = Money::from_cents(outcome.prior_held_cents);
        if prior_held.is_positive() {
            entries.push(JournalEntry::debit(deposits, prior_held));
        }

        // Recognize what was actually received across the order's life:
        // the held deposits plus this payment.
        let recognized = prior_held + total;
        entries.push(JournalEntry::credit(
            sales,
            recognized.taxable_portion(self.settings.tax_rate),
        ));
        let tax = recognized.vat_portion(self.settings.tax_rate);
        if tax.is_positive() {
            entries.push(JournalEntry::credit(vat, tax));
        }

        if cogs.is_positive() {
            let cogs_acc = self.settings.accounts.cogs.as_deref()?;
            let inventory = self.settings.accounts.inventory.as_deref()?;
            entries.push(JournalEntry::debit(cogs_acc, cogs));
            entries.push(JournalEntry::credit(inventory, cogs));
        }
        Some(entries)
    }
}

// =============================================================================
// Integration Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duka_core::ledger::accounts;
    use duka_core::{
        Customer, LayawayStatus, Product, ProductType, Quotation, SalesOrderStatus, TaxRate,
        WorkOrderStatus,
    };
    use duka_db::DbConfig;

    use crate::plans::{MaterialInput, OrderLineInput, PlanService};
    use crate::settings::AccountMapping;
    use crate::shift::ShiftService;

    /// Zero VAT keeps ledger assertions exact; the VAT split itself is
    /// covered separately.
    fn zero_vat_settings() -> EngineSettings {
        EngineSettings {
            tax_rate: TaxRate::zero(),
            ..EngineSettings::default()
        }
    }

    /// Fresh database with an open zero-float shift for user_1, so the
    /// ledger starts at zero everywhere.
    async fn setup(settings: EngineSettings) -> (Database, Checkout) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        ShiftService::new(db.clone(), settings.clone())
            .start("user_1", Money::zero())
            .await
            .unwrap();
        let checkout = Checkout::new(db.clone(), settings);
        (db, checkout)
    }

    async fn seed_product(db: &Database, id: &str, stock: i64, price: i64, cost: i64) {
        db.products()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{id}"),
                name: "Widget".to_string(),
                product_type: ProductType::Inventory,
                price_cents: price,
                cost_price_cents: cost,
                stock,
                reserved_stock: 0,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn seed_customer(db: &Database, id: &str, points: i64) {
        db.customers()
            .insert(&Customer {
                id: id.to_string(),
                name: "Jane".to_string(),
                phone: None,
                loyalty_points: points,
                is_walk_in: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    fn cash(amount: i64) -> Vec<Tender> {
        vec![Tender {
            method: PaymentMethod::Cash,
            amount: Money::from_cents(amount),
        }]
    }

    fn product_line(product_id: &str, price: i64, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: Some(product_id.to_string()),
            name: "Widget".to_string(),
            unit_price: Money::from_cents(price),
            quantity,
        }
    }

    /// A synthetic plan-payment line; never moves stock.
    fn money_line(name: &str, amount: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: None,
            name: name.to_string(),
            unit_price: Money::from_cents(amount),
            quantity: 1,
        }
    }

    fn request(lines: Vec<CheckoutLine>, tenders: Vec<Tender>, origin: PaymentOrigin) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            tenders,
            points_used: 0,
            customer_id: None,
            cashier_id: "user_1".to_string(),
            origin,
            quotation_id: None,
        }
    }

    async fn balance(db: &Database, account: &str) -> i64 {
        db.accounts().balance(account).await.unwrap().cents()
    }

    // -------------------------------------------------------------------------
    // Plain sales
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn plain_cash_sale_moves_stock_and_posts_revenue() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;

        let completed = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 2)],
                cash(25_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap();

        assert_eq!(completed.sale.receipt_number, "RCT-000001");
        assert_eq!(completed.sale.total_cents, 20_000);
        assert_eq!(completed.sale.change_cents, 5_000);
        assert_eq!(completed.items.len(), 1);
        assert_eq!(completed.items[0].cost_price_cents, 5_000);

        let product = db.products().get_by_id("prod_1").await.unwrap();
        assert_eq!(product.stock, 8);
        assert_eq!(product.reserved_stock, 0);

        // Cash nets the change off; COGS pair mirrors the stock movement
        assert_eq!(balance(&db, accounts::CASH).await, 20_000);
        assert_eq!(balance(&db, accounts::SALES).await, 20_000);
        assert_eq!(balance(&db, accounts::COGS).await, 10_000);
        assert_eq!(balance(&db, accounts::INVENTORY).await, -10_000);

        // Receipt numbers are sequential across completions
        let second = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 1)],
                cash(10_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap();
        assert_eq!(second.sale.receipt_number, "RCT-000002");
    }

    #[tokio::test]
    async fn vat_is_split_out_of_the_inclusive_total() {
        // Default settings carry 16% inclusive VAT
        let (db, checkout) = setup(EngineSettings::default()).await;
        seed_product(&db, "prod_1", 10, 11_600, 5_000).await;

        let completed = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 11_600, 1)],
                cash(11_600),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap();

        assert_eq!(completed.sale.total_cents, 11_600);
        assert_eq!(completed.sale.tax_cents, 1_600);
        assert_eq!(completed.sale.taxable_cents, 10_000);

        assert_eq!(balance(&db, accounts::SALES).await, 10_000);
        assert_eq!(balance(&db, accounts::VAT_PAYABLE).await, 1_600);
        assert_eq!(balance(&db, accounts::CASH).await, 11_600);
    }

    #[tokio::test]
    async fn payment_guards() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;

        // Underpayment
        let err = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 1)],
                cash(5_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidPayment { .. })
        ));

        // Change can only come out of cash: card overpayment is refused
        let err = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 1)],
                vec![Tender {
                    method: PaymentMethod::Card,
                    amount: Money::from_cents(15_000),
                }],
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidPayment { .. })
        ));

        // Neither attempt persisted anything
        assert_eq!(db.products().get_by_id("prod_1").await.unwrap().stock, 10);
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sale_requires_an_active_shift() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let checkout = Checkout::new(db.clone(), zero_vat_settings());
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;

        let err = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 1)],
                cash(10_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NoActiveShift)));
    }

    #[tokio::test]
    async fn stock_failure_mid_cart_rolls_back_everything() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_a", 10, 10_000, 5_000).await;
        seed_product(&db, "prod_b", 1, 10_000, 5_000).await;

        let err = checkout
            .complete_sale(request(
                vec![
                    product_line("prod_a", 10_000, 2),
                    product_line("prod_b", 10_000, 5), // only 1 in stock
                ],
                cash(70_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { .. })
        ));

        // The first line's deduction rolled back with the transaction
        assert_eq!(db.products().get_by_id("prod_a").await.unwrap().stock, 10);
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(balance(&db, accounts::CASH).await, 0);
    }

    // -------------------------------------------------------------------------
    // Work order flow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn work_order_deposit_is_held_then_settlement_recognizes_full_revenue() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 5, 10_000, 5_000).await;
        seed_customer(&db, "cust_1", 0).await;

        let order = PlanService::new(db.clone())
            .create_work_order(
                "cust_1",
                "Screen replacement",
                Money::from_cents(500_000),
                vec![MaterialInput {
                    product_id: "prod_1".to_string(),
                    quantity: 2,
                }],
                "user_1",
            )
            .await
            .unwrap();

        // Deposit: money held as a liability, no goods move
        let deposit = checkout
            .complete_sale(request(
                vec![money_line("Work order deposit", 100_000)],
                cash(100_000),
                PaymentOrigin::WorkOrderDeposit(order.id.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(deposit.sale.balance_due_cents, Some(400_000));
        assert_eq!(deposit.sale.work_order_id.as_deref(), Some(order.id.as_str()));

        assert_eq!(balance(&db, accounts::CUSTOMER_DEPOSITS).await, 100_000);
        assert_eq!(balance(&db, accounts::SALES).await, 0);
        let product = db.products().get_by_id("prod_1").await.unwrap();
        assert_eq!(product.stock, 5);
        assert_eq!(product.reserved_stock, 2);

        // Settlement: deposit released, full order value recognized,
        // reserved materials consumed
        let settlement = checkout
            .complete_sale(request(
                vec![money_line("Work order balance", 400_000)],
                cash(400_000),
                PaymentOrigin::WorkOrderBalance(order.id.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(settlement.sale.grand_total_cents, Some(500_000));
        assert_eq!(settlement.sale.deposit_applied_cents, Some(100_000));
        assert_eq!(settlement.sale.balance_due_cents, Some(0));

        assert_eq!(balance(&db, accounts::CUSTOMER_DEPOSITS).await, 0);
        assert_eq!(balance(&db, accounts::SALES).await, 500_000);
        assert_eq!(balance(&db, accounts::CASH).await, 500_000);
        assert_eq!(balance(&db, accounts::COGS).await, 10_000);
        assert_eq!(balance(&db, accounts::INVENTORY).await, -10_000);

        let product = db.products().get_by_id("prod_1").await.unwrap();
        assert_eq!(product.stock, 3);
        assert_eq!(product.reserved_stock, 0);

        let order = db.work_orders().get_by_id(&order.id).await.unwrap();
        assert_eq!(order.status, WorkOrderStatus::Completed);
        assert_eq!(order.balance_due_cents, 0);
    }

    // -------------------------------------------------------------------------
    // Layaway flow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn layaway_recognizes_revenue_per_installment() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_customer(&db, "cust_1", 0).await;

        let layaway = PlanService::new(db.clone())
            .create_layaway("cust_1", Money::from_cents(100_000), "user_1")
            .await
            .unwrap();

        let first = checkout
            .complete_sale(request(
                vec![money_line("Layaway deposit", 30_000)],
                cash(30_000),
                PaymentOrigin::LayawayDeposit(layaway.id.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(first.sale.balance_due_cents, Some(70_000));
        assert_eq!(balance(&db, accounts::SALES).await, 30_000);

        checkout
            .complete_sale(request(
                vec![money_line("Layaway installment", 70_000)],
                cash(70_000),
                PaymentOrigin::LayawayInstallment(layaway.id.clone()),
            ))
            .await
            .unwrap();

        assert_eq!(balance(&db, accounts::SALES).await, 100_000);

        let layaway = db.layaways().get_by_id(&layaway.id).await.unwrap();
        assert_eq!(layaway.status, LayawayStatus::Completed);
        assert_eq!(layaway.balance_cents, 0);

        // One appended payment row per installment
        let payments = db.layaways().payments_for(&layaway.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(
            payments.iter().map(|p| p.amount_cents).sum::<i64>(),
            100_000
        );
    }

    // -------------------------------------------------------------------------
    // Sales order flow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn sales_order_settlement_consumes_reserved_lines() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 50_000, 5_000).await;
        seed_customer(&db, "cust_1", 0).await;

        let order = PlanService::new(db.clone())
            .create_sales_order(
                "cust_1",
                vec![OrderLineInput {
                    product_id: Some("prod_1".to_string()),
                    name: "Widget".to_string(),
                    quantity: 3,
                    unit_price: Money::from_cents(50_000),
                }],
                Money::from_cents(50_000),
                "user_1",
            )
            .await
            .unwrap();
        assert_eq!(order.balance_cents, 100_000);

        // Deposit money event
        checkout
            .complete_sale(request(
                vec![money_line("Sales order deposit", 50_000)],
                cash(50_000),
                PaymentOrigin::SalesOrderDeposit(order.id.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(balance(&db, accounts::CUSTOMER_DEPOSITS).await, 50_000);
        assert_eq!(
            db.products().get_by_id("prod_1").await.unwrap().reserved_stock,
            3
        );

        // Balance payment settles the order and moves the reserved goods
        let settlement = checkout
            .complete_sale(request(
                vec![money_line("Sales order balance", 100_000)],
                cash(100_000),
                PaymentOrigin::SalesOrderBalance(order.id.clone()),
            ))
            .await
            .unwrap();
        assert_eq!(settlement.sale.grand_total_cents, Some(150_000));
        assert_eq!(settlement.sale.deposit_applied_cents, Some(50_000));

        assert_eq!(balance(&db, accounts::CUSTOMER_DEPOSITS).await, 0);
        assert_eq!(balance(&db, accounts::SALES).await, 150_000);
        assert_eq!(balance(&db, accounts::COGS).await, 15_000);

        let product = db.products().get_by_id("prod_1").await.unwrap();
        assert_eq!(product.stock, 7);
        assert_eq!(product.reserved_stock, 0);

        let order = db.sales_orders().get_by_id(&order.id).await.unwrap();
        assert_eq!(order.status, SalesOrderStatus::Completed);
        assert_eq!(order.balance_cents, 0);
    }

    // -------------------------------------------------------------------------
    // Loyalty
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn points_redeem_and_earn_against_the_running_balance() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;
        seed_customer(&db, "cust_1", 500).await;

        // Total 200.00: 50 points pay 50.00, cash covers 150.00.
        // Earn: 1 point per KSh 100 spent → 2 points.
        let mut req = request(
            vec![product_line("prod_1", 10_000, 2)],
            cash(15_000),
            PaymentOrigin::PlainSale,
        );
        req.points_used = 50;
        req.customer_id = Some("cust_1".to_string());

        let completed = checkout.complete_sale(req).await.unwrap();
        assert_eq!(completed.sale.points_used, 50);
        assert_eq!(completed.sale.points_earned, 2);
        assert_eq!(completed.sale.points_balance_after, Some(452));

        let customer = db.customers().get_by_id("cust_1").await.unwrap();
        assert_eq!(customer.loyalty_points, 452);

        // Points-funded value comes out of revenue: 200.00 − 50.00
        assert_eq!(balance(&db, accounts::SALES).await, 15_000);
        assert_eq!(balance(&db, accounts::CASH).await, 15_000);
    }

    #[tokio::test]
    async fn points_rejections() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;
        seed_customer(&db, "cust_1", 10).await;

        // No customer attached
        let mut req = request(
            vec![product_line("prod_1", 10_000, 1)],
            cash(5_000),
            PaymentOrigin::PlainSale,
        );
        req.points_used = 50;
        assert!(checkout.complete_sale(req).await.is_err());

        // The walk-in customer never redeems
        let mut req = request(
            vec![product_line("prod_1", 10_000, 1)],
            cash(5_000),
            PaymentOrigin::PlainSale,
        );
        req.points_used = 50;
        req.customer_id = Some(duka_core::WALK_IN_CUSTOMER_ID.to_string());
        assert!(checkout.complete_sale(req).await.is_err());

        // Balance too low
        let mut req = request(
            vec![product_line("prod_1", 10_000, 1)],
            cash(5_000),
            PaymentOrigin::PlainSale,
        );
        req.points_used = 50;
        req.customer_id = Some("cust_1".to_string());
        assert!(checkout.complete_sale(req).await.is_err());

        // Points never fund plan payments
        let mut req = request(
            vec![money_line("Layaway deposit", 5_000)],
            cash(5_000),
            PaymentOrigin::LayawayDeposit("lay_x".to_string()),
        );
        req.points_used = 10;
        req.customer_id = Some("cust_1".to_string());
        let err = checkout.complete_sale(req).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));

        // None of the rejections persisted a sale
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    // -------------------------------------------------------------------------
    // Quotations and degraded mode
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn quotation_conversion_marks_it_invoiced() {
        let (db, checkout) = setup(zero_vat_settings()).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;
        db.quotations()
            .insert(&Quotation {
                id: "quo_1".to_string(),
                customer_id: None,
                total_cents: 10_000,
                status: QuotationStatus::Sent,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mut req = request(
            vec![product_line("prod_1", 10_000, 1)],
            cash(10_000),
            PaymentOrigin::PlainSale,
        );
        req.quotation_id = Some("quo_1".to_string());

        let completed = checkout.complete_sale(req).await.unwrap();
        assert_eq!(completed.sale.quotation_id.as_deref(), Some("quo_1"));

        let quotation = db.quotations().get_by_id("quo_1").await.unwrap();
        assert_eq!(quotation.status, QuotationStatus::Invoiced);
    }

    #[tokio::test]
    async fn unconfigured_mapping_completes_the_sale_without_posting() {
        let settings = EngineSettings {
            accounts: AccountMapping::unconfigured(),
            tax_rate: TaxRate::zero(),
            ..EngineSettings::default()
        };
        let (db, checkout) = setup(settings).await;
        seed_product(&db, "prod_1", 10, 10_000, 5_000).await;

        let completed = checkout
            .complete_sale(request(
                vec![product_line("prod_1", 10_000, 1)],
                cash(10_000),
                PaymentOrigin::PlainSale,
            ))
            .await
            .unwrap();
        assert_eq!(completed.sale.total_cents, 10_000);

        // Goods and the receipt exist; the ledger never moved
        assert_eq!(db.products().get_by_id("prod_1").await.unwrap().stock, 9);
        assert_eq!(balance(&db, accounts::CASH).await, 0);
        assert_eq!(balance(&db, accounts::SALES).await, 0);
    }
}
