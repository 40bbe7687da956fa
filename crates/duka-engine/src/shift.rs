//! # Shift Session Service
//!
//! The cash-float lifecycle around one operator's drawer.
//!
//! ## Float Choreography
//! ```text
//! start(user, float 1000)                      end(shift, counted cash)
//!       │                                             │
//!       ▼                                             ▼
//! ┌───────────────────────┐                 ┌───────────────────────────┐
//! │ Dr Shift Float Clear. │                 │ reverse the float posting │
//! │ Cr Cash               │ ──────────────► │ Dr Cash / Cr Clearing     │
//! └───────────────────────┘                 │ breakdown, expected,      │
//!  float leaves the safe,                   │ variance = actual−expected│
//!  lives in the drawer                      └───────────────────────────┘
//!
//! Invariant: after close, Cash and Shift Float Clearing are back at their
//! pre-shift balances (the two postings cancel exactly).
//! ```
//!
//! The close is gated on `status == active` both here and in the UPDATE,
//! so the reversal can never run twice.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::poster::LedgerPoster;
use crate::settings::EngineSettings;
use duka_core::{
    cash_variance, CoreError, Expense, JournalEntry, Money, ReferenceType, Shift, ShiftStatus,
    ShiftTotals,
};
use duka_db::Database;

/// Service for shift start/end and drawer payouts.
#[derive(Debug, Clone)]
pub struct ShiftService {
    db: Database,
    poster: LedgerPoster,
    settings: EngineSettings,
}

impl ShiftService {
    /// Creates a new ShiftService.
    pub fn new(db: Database, settings: EngineSettings) -> Self {
        let poster = LedgerPoster::new(db.clone());
        ShiftService {
            db,
            poster,
            settings,
        }
    }

    /// Opens a shift with a starting cash float.
    ///
    /// Rejects a second active shift for the same user. Posts the
    /// float-clearing transaction (Dr Clearing / Cr Cash) when the float is
    /// positive and both accounts are configured, and clocks the user in.
    pub async fn start(&self, user_id: &str, starting_float: Money) -> EngineResult<Shift> {
        if let Some(active) = self.db.shifts().active_for_user(user_id).await? {
            return Err(EngineError::Core(CoreError::ShiftAlreadyActive {
                user_id: active.user_id,
            }));
        }

        let shift_id = Uuid::new_v4().to_string();
        let mut tx = self.db.begin().await?;

        let float_transaction_id = match (
            &self.settings.accounts.shift_float_clearing,
            &self.settings.accounts.cash,
        ) {
            (Some(clearing), Some(cash)) if starting_float.is_positive() => {
                let posted = self
                    .poster
                    .post(
                        &mut tx,
                        format!("Shift float issued ({starting_float})"),
                        shift_id.clone(),
                        ReferenceType::Shift,
                        vec![
                            JournalEntry::debit(clearing.clone(), starting_float),
                            JournalEntry::credit(cash.clone(), starting_float),
                        ],
                    )
                    .await?;
                Some(posted.id)
            }
            _ => {
                if starting_float.is_positive() {
                    warn!(
                        user_id = %user_id,
                        "Float accounts not configured; skipping float posting"
                    );
                }
                None
            }
        };

        let shift = Shift {
            id: shift_id.clone(),
            user_id: user_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: ShiftStatus::Active,
            starting_float_cents: starting_float.cents(),
            total_sales_cents: 0,
            total_payouts_cents: 0,
            expected_cash_cents: None,
            actual_cash_cents: None,
            cash_variance_cents: None,
            payment_breakdown: None,
            float_transaction_id,
            notes: None,
        };

        self.db.shifts().insert(&mut tx, &shift).await?;
        self.db.shifts().clock_in(&mut tx, user_id, &shift_id).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "shift_started",
                "shift",
                &shift_id,
                json!({ "starting_float_cents": starting_float.cents() }),
                user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(shift_id = %shift.id, user_id = %user_id, "Shift started");
        Ok(shift)
    }

    /// Closes a shift against the counted drawer cash.
    ///
    /// Derives the payment breakdown and expected cash from the shift's
    /// sales and payouts, reverses the float posting, stamps the clock-out
    /// and flips the shift to Closed.
    pub async fn end(
        &self,
        shift_id: &str,
        actual_cash: Money,
        notes: Option<String>,
    ) -> EngineResult<Shift> {
        let mut shift = self.db.shifts().get_by_id(shift_id).await?;
        if !shift.is_active() {
            return Err(EngineError::Core(CoreError::ShiftNotActive {
                shift_id: shift_id.to_string(),
            }));
        }

        let sales = self.db.sales().sales_for_shift(shift_id).await?;
        let expenses = self.db.shifts().expenses_for(shift_id).await?;

        let totals = ShiftTotals::compute(
            sales.iter().map(|(sale, payments)| (sale, payments.as_slice())),
            &expenses,
        );
        let expected = totals.expected_cash_in_drawer(shift.starting_float());
        let variance = cash_variance(actual_cash, expected);

        shift.end_time = Some(Utc::now());
        shift.status = ShiftStatus::Closed;
        shift.total_sales_cents = totals.total_sales_cents;
        shift.total_payouts_cents = totals.total_payouts_cents;
        shift.expected_cash_cents = Some(expected.cents());
        shift.actual_cash_cents = Some(actual_cash.cents());
        shift.cash_variance_cents = Some(variance.cents());
        shift.payment_breakdown = Some(serde_json::to_string(&totals.breakdown)?);
        shift.notes = notes;

        // Load the float posting before the transaction starts; the pool
        // may have a single connection and the tx will hold it.
        let float_posting = match &shift.float_transaction_id {
            Some(float_tx_id) => Some(self.db.accounts().get_transaction(float_tx_id).await?),
            None => None,
        };

        let mut tx = self.db.begin().await?;

        if let Some(original) = &float_posting {
            self.poster
                .post_reversal(&mut tx, original, "Shift float returned")
                .await?;
        }

        self.db.shifts().save_close(&mut tx, &shift).await?;
        self.db.shifts().clock_out(&mut tx, shift_id).await?;
        self.db
            .audit()
            .record(
                &mut tx,
                "shift_ended",
                "shift",
                shift_id,
                json!({
                    "expected_cash_cents": expected.cents(),
                    "actual_cash_cents": actual_cash.cents(),
                    "cash_variance_cents": variance.cents(),
                }),
                &shift.user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        info!(
            shift_id = %shift_id,
            variance_cents = variance.cents(),
            "Shift closed"
        );
        Ok(shift)
    }

    /// Records a cash payout from the drawer (courier, supplies...).
    ///
    /// Posts Dr Operating Expenses / Cr Cash when both are configured; the
    /// payout reduces expected drawer cash at close either way.
    pub async fn record_expense(
        &self,
        shift_id: &str,
        description: &str,
        amount: Money,
    ) -> EngineResult<Expense> {
        let shift = self.db.shifts().get_by_id(shift_id).await?;
        if !shift.is_active() {
            return Err(EngineError::Core(CoreError::ShiftNotActive {
                shift_id: shift_id.to_string(),
            }));
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidRequest(
                "Expense amount must be positive".to_string(),
            ));
        }

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            shift_id: shift_id.to_string(),
            description: description.to_string(),
            amount_cents: amount.cents(),
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        self.db.shifts().insert_expense(&mut tx, &expense).await?;

        match (
            &self.settings.accounts.operating_expenses,
            &self.settings.accounts.cash,
        ) {
            (Some(expenses_acc), Some(cash)) => {
                self.poster
                    .post(
                        &mut tx,
                        format!("Payout: {description}"),
                        shift_id.to_string(),
                        ReferenceType::Shift,
                        vec![
                            JournalEntry::debit(expenses_acc.clone(), amount),
                            JournalEntry::credit(cash.clone(), amount),
                        ],
                    )
                    .await?;
            }
            _ => {
                warn!(shift_id = %shift_id, "Expense accounts not configured; skipping posting");
            }
        }

        self.db
            .audit()
            .record(
                &mut tx,
                "expense_recorded",
                "shift",
                shift_id,
                json!({ "description": description, "amount_cents": amount.cents() }),
                &shift.user_id,
            )
            .await?;
        tx.commit()
            .await
            .map_err(|e| duka_db::DbError::TransactionFailed(e.to_string()))?;

        Ok(expense)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::ledger::accounts;
    use duka_db::DbConfig;

    async fn service() -> (Database, ShiftService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let svc = ShiftService::new(db.clone(), EngineSettings::default());
        (db, svc)
    }

    #[tokio::test]
    async fn start_posts_float_and_blocks_second_shift() {
        let (db, svc) = service().await;

        let shift = svc.start("user_1", Money::from_cents(100_000)).await.unwrap();
        assert!(shift.float_transaction_id.is_some());

        // Float moved from the safe (Cash) into the clearing account
        assert_eq!(
            db.accounts().balance(accounts::CASH).await.unwrap().cents(),
            -100_000
        );
        assert_eq!(
            db.accounts()
                .balance(accounts::SHIFT_FLOAT_CLEARING)
                .await
                .unwrap()
                .cents(),
            // Clearing is a liability; a debit reads as a negative balance
            -100_000
        );

        let err = svc.start("user_1", Money::from_cents(5_000)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ShiftAlreadyActive { .. })
        ));
    }

    #[tokio::test]
    async fn end_reverses_float_and_computes_variance() {
        let (db, svc) = service().await;

        let shift = svc.start("user_1", Money::from_cents(100_000)).await.unwrap();
        svc.record_expense(&shift.id, "Courier", Money::from_cents(2_000))
            .await
            .unwrap();

        // No sales: expected = 1000.00 − 20.00 = 980.00; drawer counted 975.00
        let closed = svc
            .end(&shift.id, Money::from_cents(97_500), None)
            .await
            .unwrap();

        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.expected_cash_cents, Some(98_000));
        assert_eq!(closed.cash_variance_cents, Some(-500));

        // Float posting + reversal cancel; only the payout remains on Cash
        assert_eq!(
            db.accounts().balance(accounts::CASH).await.unwrap().cents(),
            -2_000
        );
        assert_eq!(
            db.accounts()
                .balance(accounts::SHIFT_FLOAT_CLEARING)
                .await
                .unwrap()
                .cents(),
            0
        );

        // Closing twice is refused
        let err = svc
            .end(&shift.id, Money::from_cents(97_500), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::ShiftNotActive { .. })
        ));
    }

    #[tokio::test]
    async fn unconfigured_accounts_degrade_to_no_posting() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = EngineSettings {
            accounts: crate::settings::AccountMapping::unconfigured(),
            ..EngineSettings::default()
        };
        let svc = ShiftService::new(db.clone(), settings);

        let shift = svc.start("user_1", Money::from_cents(50_000)).await.unwrap();
        assert!(shift.float_transaction_id.is_none());

        // Shift still opens and closes; the ledger just never moved
        let closed = svc.end(&shift.id, Money::from_cents(50_000), None).await.unwrap();
        assert_eq!(closed.cash_variance_cents, Some(0));
        assert_eq!(db.accounts().balance(accounts::CASH).await.unwrap().cents(), 0);
    }
}
