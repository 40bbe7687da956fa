//! # Deferred Plan Services
//!
//! Creation and lifecycle management for layaways, work orders and sales
//! orders. Payments against these plans do NOT live here - every payment
//! goes through [`crate::checkout::Checkout::complete_sale`] with the
//! matching [`duka_core::PaymentOrigin`].
//!
//! ## Reservation Discipline
//! ```text
//! create   reserve every inventory line, all-or-nothing: the first line
//!          that cannot be covered aborts the transaction and releases
//!          nothing (nothing was committed yet)
//!
//! cancel   release the reservations exactly once - the status guard on
//!          the transition into Cancelled is what makes a second cancel
//!          fail before any counter moves
//!
//! settle   checkout deducts the reserved lines (deduct_reserved moves
//!          stock and reserved together)
//! ```

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use duka_core::{
    receipt_status, Layaway, LayawayStatus, Money, SalesOrder, SalesOrderItem, SalesOrderStatus,
    WorkOrder, WorkOrderMaterial, WorkOrderStatus,
};
use duka_db::Database;

// =============================================================================
// Inputs
// =============================================================================

/// One requested work-order material line.
#[derive(Debug, Clone)]
pub struct MaterialInput {
    pub product_id: String,
    pub quantity: i64,
}

/// One requested sales-order line.
#[derive(Debug, Clone)]
pub struct OrderLineInput {
    /// None for free-text lines; only linked lines reserve stock.
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

// =============================================================================
// Plan Service
// =============================================================================

/// Service for plan creation and lifecycle transitions.
#[derive(Debug, Clone)]
pub struct PlanService {
    db: Database,
}

impl PlanService {
    /// Creates a new PlanService.
    pub fn new(db: Database) -> Self {
        PlanService { db }
    }

    // -------------------------------------------------------------------------
    // Layaway
    // -------------------------------------------------------------------------

    /// Opens a layaway plan. The goods are held at the counter; the plan
    /// tracks money only.
    pub async fn create_layaway(
        &self,
        customer_id: &str,
        total: Money,
        user_id: &str,
    ) -> EngineResult<Layaway> {
        if !total.is_positive() {
            return Err(EngineError::InvalidRequest(
                "Layaway total must be positive".to_string(),
            ));
        }

        let layaway = Layaway {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            total_cents: total.cents(),
            balance_cents: total.cents(),
            status: LayawayStatus::Active,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        self.db.layaways().insert(&mut tx, &layaway).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "layaway_created",
                "layaway",
                &layaway.id,
                json!({ "total_cents": total.cents() }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(layaway_id = %layaway.id, "Layaway created");
        Ok(layaway)
    }

    /// Cancels an active layaway.
    pub async fn cancel_layaway(&self, layaway_id: &str, user_id: &str) -> EngineResult<Layaway> {
        let mut layaway = self.db.layaways().get_by_id(layaway_id).await?;
        layaway.cancel()?;

        let mut tx = self.db.begin().await?;
        self.db.layaways().save(&mut tx, &layaway).await?;
        self.db
            .audit()
            .record(&mut tx, "layaway_cancelled", "layaway", layaway_id, json!({}), user_id)
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;
        Ok(layaway)
    }

    /// Writes an active layaway off after missed installments.
    pub async fn default_layaway(&self, layaway_id: &str, user_id: &str) -> EngineResult<Layaway> {
        let mut layaway = self.db.layaways().get_by_id(layaway_id).await?;
        layaway.mark_defaulted()?;

        let mut tx = self.db.begin().await?;
        self.db.layaways().save(&mut tx, &layaway).await?;
        self.db
            .audit()
            .record(&mut tx, "layaway_defaulted", "layaway", layaway_id, json!({}), user_id)
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;
        Ok(layaway)
    }

    // -------------------------------------------------------------------------
    // Work Order
    // -------------------------------------------------------------------------

    /// Opens a work order, reserving every material line. Any line that
    /// cannot be covered aborts the whole creation.
    pub async fn create_work_order(
        &self,
        customer_id: &str,
        description: &str,
        total_cost: Money,
        materials: Vec<MaterialInput>,
        user_id: &str,
    ) -> EngineResult<WorkOrder> {
        if !total_cost.is_positive() {
            return Err(EngineError::InvalidRequest(
                "Work order cost must be positive".to_string(),
            ));
        }

        let order = WorkOrder {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            description: description.to_string(),
            total_cost_cents: total_cost.cents(),
            amount_paid_cents: 0,
            balance_due_cents: total_cost.cents(),
            status: WorkOrderStatus::Pending,
            created_at: Utc::now(),
        };

        let material_rows: Vec<WorkOrderMaterial> = materials
            .iter()
            .map(|m| WorkOrderMaterial {
                id: Uuid::new_v4().to_string(),
                work_order_id: order.id.clone(),
                product_id: m.product_id.clone(),
                quantity: m.quantity,
            })
            .collect();

        let mut tx = self.db.begin().await?;

        // All-or-nothing: a reservation failure rolls everything back.
        for material in &materials {
            let mut product = self.db.products().fetch(&mut tx, &material.product_id).await?;
            product.reserve(material.quantity)?;
            self.db.products().save_stock(&mut tx, &product).await?;
        }

        self.db.work_orders().insert(&mut tx, &order, &material_rows).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "work_order_created",
                "work_order",
                &order.id,
                json!({
                    "total_cost_cents": total_cost.cents(),
                    "materials": materials.len(),
                }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(work_order_id = %order.id, "Work order created");
        Ok(order)
    }

    /// Moves a work order through its workflow states. Completion with a
    /// balance due is refused; Cancelled is handled by
    /// [`PlanService::cancel_work_order`].
    pub async fn set_work_order_status(
        &self,
        work_order_id: &str,
        status: WorkOrderStatus,
        user_id: &str,
    ) -> EngineResult<WorkOrder> {
        if status == WorkOrderStatus::Cancelled {
            return self.cancel_work_order(work_order_id, user_id).await;
        }

        let mut order = self.db.work_orders().get_by_id(work_order_id).await?;
        order.set_status(status)?;

        let mut tx = self.db.begin().await?;
        self.db.work_orders().save(&mut tx, &order).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "work_order_status_changed",
                "work_order",
                work_order_id,
                json!({ "status": status }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;
        Ok(order)
    }

    /// Cancels a work order and releases its material reservations.
    ///
    /// The release happens only on the transition into Cancelled; a second
    /// cancel fails the transition before any counter moves, so the
    /// reservations cannot be released twice.
    pub async fn cancel_work_order(
        &self,
        work_order_id: &str,
        user_id: &str,
    ) -> EngineResult<WorkOrder> {
        let mut order = self.db.work_orders().get_by_id(work_order_id).await?;
        order.set_status(WorkOrderStatus::Cancelled)?;

        let mut tx = self.db.begin().await?;
        self.db.work_orders().save(&mut tx, &order).await?;

        let materials = self.db.work_orders().materials_for_tx(&mut tx, work_order_id).await?;
        for material in &materials {
            let mut product = self.db.products().fetch(&mut tx, &material.product_id).await?;
            product.release(material.quantity);
            self.db.products().save_stock(&mut tx, &product).await?;
        }

        self.db
            .audit()
            .record(
                &mut tx,
                "work_order_cancelled",
                "work_order",
                work_order_id,
                json!({ "released_materials": materials.len() }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(work_order_id = %work_order_id, "Work order cancelled");
        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Sales Order
    // -------------------------------------------------------------------------

    /// Opens a sales order with a deposit amount recorded against it.
    /// Linked inventory lines are reserved all-or-nothing; the deposit
    /// money itself arrives through checkout with `SalesOrderDeposit`.
    pub async fn create_sales_order(
        &self,
        customer_id: &str,
        lines: Vec<OrderLineInput>,
        deposit: Money,
        user_id: &str,
    ) -> EngineResult<SalesOrder> {
        if lines.is_empty() {
            return Err(EngineError::InvalidRequest(
                "Sales order needs at least one line".to_string(),
            ));
        }

        let total: Money = lines.iter().map(|l| l.unit_price * l.quantity).sum();
        if deposit.cents() > total.cents() {
            return Err(EngineError::InvalidRequest(
                "Deposit cannot exceed the order total".to_string(),
            ));
        }

        let order = SalesOrder {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            total_cents: total.cents(),
            deposit_cents: deposit.cents(),
            balance_cents: total.cents() - deposit.cents(),
            status: SalesOrderStatus::Pending,
            created_at: Utc::now(),
        };

        let item_rows: Vec<SalesOrderItem> = lines
            .iter()
            .map(|l| SalesOrderItem {
                id: Uuid::new_v4().to_string(),
                sales_order_id: order.id.clone(),
                product_id: l.product_id.clone(),
                name_snapshot: l.name.clone(),
                quantity: l.quantity,
                quantity_received: 0,
                unit_price_cents: l.unit_price.cents(),
            })
            .collect();

        let mut tx = self.db.begin().await?;

        for line in lines.iter().filter(|l| l.product_id.is_some()) {
            let product_id = line.product_id.as_deref().unwrap_or_default();
            let mut product = self.db.products().fetch(&mut tx, product_id).await?;
            product.reserve(line.quantity)?;
            self.db.products().save_stock(&mut tx, &product).await?;
        }

        self.db.sales_orders().insert(&mut tx, &order, &item_rows).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "sales_order_created",
                "sales_order",
                &order.id,
                json!({
                    "total_cents": total.cents(),
                    "deposit_cents": deposit.cents(),
                }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(sales_order_id = %order.id, "Sales order created");
        Ok(order)
    }

    /// Pending → Ordered, once a purchase order covers the lines.
    pub async fn mark_sales_order_ordered(
        &self,
        sales_order_id: &str,
        user_id: &str,
    ) -> EngineResult<SalesOrder> {
        let mut order = self.db.sales_orders().get_by_id(sales_order_id).await?;
        order.mark_ordered()?;

        let mut tx = self.db.begin().await?;
        self.db.sales_orders().save(&mut tx, &order).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "sales_order_ordered",
                "sales_order",
                sales_order_id,
                json!({}),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;
        Ok(order)
    }

    /// Records a goods receipt: advances `quantity_received` on the named
    /// lines and derives the order status from the resulting counters.
    pub async fn receive_sales_order_items(
        &self,
        sales_order_id: &str,
        receipts: &[(String, i64)],
        user_id: &str,
    ) -> EngineResult<SalesOrder> {
        let mut order = self.db.sales_orders().get_by_id(sales_order_id).await?;
        let mut items = self.db.sales_orders().items_for(sales_order_id).await?;

        let mut tx = self.db.begin().await?;

        for (item_id, qty) in receipts {
            let Some(item) = items.iter_mut().find(|i| &i.id == item_id) else {
                return Err(EngineError::InvalidRequest(format!(
                    "Line {item_id} does not belong to order {sales_order_id}"
                )));
            };
            item.quantity_received = (item.quantity_received + qty).min(item.quantity);
            self.db.sales_orders().save_item(&mut tx, item).await?;
        }

        order.status = receipt_status(&items);
        self.db.sales_orders().save(&mut tx, &order).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "sales_order_received",
                "sales_order",
                sales_order_id,
                json!({ "lines": receipts.len() }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;
        Ok(order)
    }

    /// Cancels a sales order and releases its outstanding reservations.
    pub async fn cancel_sales_order(
        &self,
        sales_order_id: &str,
        user_id: &str,
    ) -> EngineResult<SalesOrder> {
        let mut order = self.db.sales_orders().get_by_id(sales_order_id).await?;
        order.cancel()?;

        let mut tx = self.db.begin().await?;
        self.db.sales_orders().save(&mut tx, &order).await?;

        let items = self.db.sales_orders().items_for_tx(&mut tx, sales_order_id).await?;
        for item in items.iter().filter(|i| i.product_id.is_some()) {
            let product_id = item.product_id.as_deref().unwrap_or_default();
            let mut product = self.db.products().fetch(&mut tx, product_id).await?;
            product.release(item.quantity);
            self.db.products().save_stock(&mut tx, &product).await?;
        }

        self.db
            .audit()
            .record(
                &mut tx,
                "sales_order_cancelled",
                "sales_order",
                sales_order_id,
                json!({}),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(sales_order_id = %sales_order_id, "Sales order cancelled");
        Ok(order)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duka_core::{CoreError, Customer, Product, ProductType};
    use duka_db::DbConfig;

    /// Fresh database with the plan customer in place (plan rows carry a
    /// NOT NULL foreign key to customers).
    async fn setup() -> (Database, PlanService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers()
            .insert(&Customer {
                id: "cust_1".to_string(),
                name: "Jane".to_string(),
                phone: None,
                loyalty_points: 0,
                is_walk_in: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let svc = PlanService::new(db.clone());
        (db, svc)
    }

    async fn seed_product(db: &Database, id: &str, stock: i64) {
        db.products()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{id}"),
                name: "Part".to_string(),
                product_type: ProductType::Inventory,
                price_cents: 10_000,
                cost_price_cents: 5_000,
                stock,
                reserved_stock: 0,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn work_order_reservation_is_all_or_nothing() {
        let (db, svc) = setup().await;
        seed_product(&db, "prod_a", 10).await;
        seed_product(&db, "prod_b", 1).await;

        let err = svc
            .create_work_order(
                "cust_1",
                "Repair",
                Money::from_cents(50_000),
                vec![
                    MaterialInput {
                        product_id: "prod_a".to_string(),
                        quantity: 5,
                    },
                    MaterialInput {
                        product_id: "prod_b".to_string(),
                        quantity: 3, // only 1 available
                    },
                ],
                "user_1",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { .. })
        ));

        // The first line's reservation rolled back with the transaction
        let a = db.products().get_by_id("prod_a").await.unwrap();
        assert_eq!(a.reserved_stock, 0);
    }

    #[tokio::test]
    async fn cancelling_a_work_order_releases_materials_once() {
        let (db, svc) = setup().await;
        seed_product(&db, "prod_a", 10).await;

        let order = svc
            .create_work_order(
                "cust_1",
                "Repair",
                Money::from_cents(50_000),
                vec![MaterialInput {
                    product_id: "prod_a".to_string(),
                    quantity: 4,
                }],
                "user_1",
            )
            .await
            .unwrap();
        assert_eq!(
            db.products().get_by_id("prod_a").await.unwrap().reserved_stock,
            4
        );

        svc.cancel_work_order(&order.id, "user_1").await.unwrap();
        assert_eq!(
            db.products().get_by_id("prod_a").await.unwrap().reserved_stock,
            0
        );

        // Cancelled is terminal: the second cancel fails before any
        // counter could move again
        let err = svc.cancel_work_order(&order.id, "user_1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition { .. })
        ));
        assert_eq!(
            db.products().get_by_id("prod_a").await.unwrap().reserved_stock,
            0
        );
    }

    #[tokio::test]
    async fn sales_order_receipts_advance_status() {
        let (db, svc) = setup().await;
        seed_product(&db, "prod_a", 10).await;
        seed_product(&db, "prod_b", 10).await;

        let order = svc
            .create_sales_order(
                "cust_1",
                vec![
                    OrderLineInput {
                        product_id: Some("prod_a".to_string()),
                        name: "Part A".to_string(),
                        quantity: 3,
                        unit_price: Money::from_cents(10_000),
                    },
                    OrderLineInput {
                        product_id: Some("prod_b".to_string()),
                        name: "Part B".to_string(),
                        quantity: 2,
                        unit_price: Money::from_cents(20_000),
                    },
                ],
                Money::from_cents(20_000),
                "user_1",
            )
            .await
            .unwrap();
        assert_eq!(order.total_cents, 70_000);
        assert_eq!(order.balance_cents, 50_000);

        svc.mark_sales_order_ordered(&order.id, "user_1").await.unwrap();

        let items = db.sales_orders().items_for(&order.id).await.unwrap();
        let first = items.iter().find(|i| i.name_snapshot == "Part A").unwrap();

        let updated = svc
            .receive_sales_order_items(&order.id, &[(first.id.clone(), 3)], "user_1")
            .await
            .unwrap();
        assert_eq!(updated.status, SalesOrderStatus::PartiallyReceived);

        let second = items.iter().find(|i| i.name_snapshot == "Part B").unwrap();
        let updated = svc
            .receive_sales_order_items(&order.id, &[(second.id.clone(), 2)], "user_1")
            .await
            .unwrap();
        assert_eq!(updated.status, SalesOrderStatus::Received);
    }

    #[tokio::test]
    async fn cancelling_a_sales_order_releases_lines() {
        let (db, svc) = setup().await;
        seed_product(&db, "prod_a", 10).await;

        let order = svc
            .create_sales_order(
                "cust_1",
                vec![OrderLineInput {
                    product_id: Some("prod_a".to_string()),
                    name: "Part A".to_string(),
                    quantity: 6,
                    unit_price: Money::from_cents(10_000),
                }],
                Money::zero(),
                "user_1",
            )
            .await
            .unwrap();
        assert_eq!(
            db.products().get_by_id("prod_a").await.unwrap().reserved_stock,
            6
        );

        svc.cancel_sales_order(&order.id, "user_1").await.unwrap();
        assert_eq!(
            db.products().get_by_id("prod_a").await.unwrap().reserved_stock,
            0
        );
    }

    #[tokio::test]
    async fn layaway_lifecycle_guards() {
        let (_db, svc) = setup().await;

        let layaway = svc
            .create_layaway("cust_1", Money::from_cents(100_000), "user_1")
            .await
            .unwrap();

        svc.default_layaway(&layaway.id, "user_1").await.unwrap();

        let err = svc.cancel_layaway(&layaway.id, "user_1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidTransition { .. })
        ));
    }
}
