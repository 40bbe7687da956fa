//! # Ledger Poster
//!
//! The single gateway through which anything reaches the general ledger.
//!
//! ## Balanced-or-Nothing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entries ──► AccountingTransaction::new ──► insert_transaction          │
//! │                     │                                                    │
//! │                     └── Σdebit ≠ Σcredit → CoreError, nothing written   │
//! │                                                                          │
//! │  The poster writes on the CALLER's connection, so when a completion     │
//! │  rolls back, its postings vanish with it.                               │
//! │                                                                          │
//! │  Corrections are new postings (reversal_entries), never edits.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::EngineResult;
use duka_core::{AccountingTransaction, JournalEntry, ReferenceType};
use duka_db::Database;

/// Disambiguates postings created within the same millisecond.
static POSTING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Posts balanced transactions to the general ledger.
#[derive(Debug, Clone)]
pub struct LedgerPoster {
    db: Database,
}

impl LedgerPoster {
    /// Creates a new LedgerPoster.
    pub fn new(db: Database) -> Self {
        LedgerPoster { db }
    }

    /// Validates and persists one posting on the caller's connection.
    ///
    /// Fails before any write when the entries are empty or unbalanced.
    pub async fn post(
        &self,
        conn: &mut SqliteConnection,
        description: impl Into<String>,
        reference_id: impl Into<String>,
        reference_type: ReferenceType,
        entries: Vec<JournalEntry>,
    ) -> EngineResult<AccountingTransaction> {
        let tx = AccountingTransaction::new(
            next_transaction_id(),
            Utc::now(),
            description,
            reference_id,
            reference_type,
            entries,
        )?;

        self.db.accounts().insert_transaction(conn, &tx).await?;

        debug!(
            transaction_id = %tx.id,
            debit_cents = tx.debit_total().cents(),
            "Posted to ledger"
        );
        Ok(tx)
    }

    /// Posts the equal-and-opposite correction for an existing posting.
    pub async fn post_reversal(
        &self,
        conn: &mut SqliteConnection,
        original: &AccountingTransaction,
        description: impl Into<String>,
    ) -> EngineResult<AccountingTransaction> {
        self.post(
            conn,
            description,
            original.reference_id.clone(),
            original.reference_type,
            original.reversal_entries(),
        )
        .await
    }
}

/// `trans_<millis>_<seq>`: sortable by creation time, collision-free
/// within the process.
fn next_transaction_id() -> String {
    let seq = POSTING_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("trans_{}_{}", Utc::now().timestamp_millis(), seq)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::ledger::accounts;
    use duka_core::{CoreError, Money};
    use duka_db::DbConfig;

    use crate::error::EngineError;

    #[tokio::test]
    async fn unbalanced_posting_writes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let poster = LedgerPoster::new(db.clone());

        let mut tx = db.begin().await.unwrap();
        let err = poster
            .post(
                &mut tx,
                "Bad posting",
                "sale_x",
                ReferenceType::Sale,
                vec![
                    JournalEntry::debit(accounts::CASH, Money::from_cents(1_000)),
                    JournalEntry::credit(accounts::SALES, Money::from_cents(500)),
                ],
            )
            .await
            .unwrap_err();
        tx.commit().await.unwrap();

        assert!(matches!(
            err,
            EngineError::Core(CoreError::UnbalancedTransaction { .. })
        ));
        assert_eq!(db.accounts().balance(accounts::CASH).await.unwrap().cents(), 0);
    }

    #[tokio::test]
    async fn posting_and_reversal_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let poster = LedgerPoster::new(db.clone());

        let mut tx = db.begin().await.unwrap();
        let posted = poster
            .post(
                &mut tx,
                "Shift float",
                "shift_1",
                ReferenceType::Shift,
                vec![
                    JournalEntry::debit(accounts::SHIFT_FLOAT_CLEARING, Money::from_cents(100_000)),
                    JournalEntry::credit(accounts::CASH, Money::from_cents(100_000)),
                ],
            )
            .await
            .unwrap();
        poster
            .post_reversal(&mut tx, &posted, "Shift float reversal")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.accounts().balance(accounts::CASH).await.unwrap().cents(), 0);
        assert_eq!(
            db.accounts()
                .balance(accounts::SHIFT_FLOAT_CLEARING)
                .await
                .unwrap()
                .cents(),
            0
        );
    }

    #[test]
    fn transaction_ids_are_unique() {
        let a = next_transaction_id();
        let b = next_transaction_id();
        assert_ne!(a, b);
        assert!(a.starts_with("trans_"));
    }
}
