//! # Account & Ledger Repository
//!
//! Persistence for the chart of accounts and the append-only general
//! ledger.
//!
//! ## Append-Only Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  accounting_transactions + journal_entries are INSERT-only.            │
//! │                                                                         │
//! │  • No UPDATE or DELETE statements exist in this module                 │
//! │  • Corrections are new postings (reversals), written by the engine     │
//! │  • Balances are derived from entries at read time, never stored        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balance arithmetic (debit-normal vs credit-normal sign flip) lives in
//! `duka_core::ledger`; this module only fetches the rows.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use duka_core::ledger::{account_balance, default_chart_of_accounts};
use duka_core::{Account, AccountingTransaction, JournalEntry, Money, ReferenceType};

/// Transaction header row; entries are fetched separately and zipped back
/// into a `duka_core::AccountingTransaction`.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    date: chrono::DateTime<chrono::Utc>,
    description: String,
    reference_id: String,
    reference_type: ReferenceType,
}

/// Repository for the chart of accounts and ledger postings.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Seeds the default chart of accounts. `INSERT OR IGNORE`, so running
    /// on every startup is harmless.
    pub async fn seed_defaults(&self) -> DbResult<()> {
        for account in default_chart_of_accounts() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO accounts (id, code, name, account_type, is_editable)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&account.id)
            .bind(&account.code)
            .bind(&account.name)
            .bind(account.account_type)
            .bind(account.is_editable)
            .execute(&self.pool)
            .await?;
        }
        debug!("Chart of accounts seeded");
        Ok(())
    }

    /// Lists the full chart of accounts ordered by ledger code.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT id, code, name, account_type, is_editable FROM accounts ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    /// Fetches one account by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT id, code, name, account_type, is_editable FROM accounts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Account", id))
    }

    /// Persists a balanced posting: one header row plus one row per entry.
    ///
    /// Balance was enforced when the `AccountingTransaction` was
    /// constructed, so this method is pure persistence. Takes a connection
    /// so the caller's transaction covers both tables.
    pub async fn insert_transaction(
        &self,
        conn: &mut SqliteConnection,
        tx: &AccountingTransaction,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounting_transactions (id, date, description, reference_id, reference_type)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&tx.id)
        .bind(tx.date)
        .bind(&tx.description)
        .bind(&tx.reference_id)
        .bind(tx.reference_type)
        .execute(&mut *conn)
        .await?;

        for entry in &tx.entries {
            sqlx::query(
                r#"
                INSERT INTO journal_entries (id, transaction_id, account_id, debit_cents, credit_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&tx.id)
            .bind(&entry.account_id)
            .bind(entry.debit_cents)
            .bind(entry.credit_cents)
            .execute(&mut *conn)
            .await?;
        }

        debug!(
            transaction_id = %tx.id,
            entries = tx.entries.len(),
            "Ledger posting persisted"
        );
        Ok(())
    }

    /// Reconstructs one posting with its entries.
    pub async fn get_transaction(&self, id: &str) -> DbResult<AccountingTransaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, date, description, reference_id, reference_type
            FROM accounting_transactions WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("AccountingTransaction", id))?;

        let entries = self.entries_for_transaction(&row.id).await?;
        self.assemble(row, entries)
    }

    /// All postings that reference one source document (a sale, a shift...).
    pub async fn transactions_for_reference(
        &self,
        reference_id: &str,
    ) -> DbResult<Vec<AccountingTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, date, description, reference_id, reference_type
            FROM accounting_transactions WHERE reference_id = ?1 ORDER BY date
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let entries = self.entries_for_transaction(&row.id).await?;
            result.push(self.assemble(row, entries)?);
        }
        Ok(result)
    }

    /// All journal entries that touch one account.
    pub async fn entries_for_account(&self, account_id: &str) -> DbResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT account_id, debit_cents, credit_cents
            FROM journal_entries WHERE account_id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Derives an account's balance from its entries, sign-flipped per the
    /// account class.
    pub async fn balance(&self, account_id: &str) -> DbResult<Money> {
        let account = self.get_by_id(account_id).await?;
        let entries = self.entries_for_account(account_id).await?;
        Ok(account_balance(account.account_type, &entries))
    }

    /// Every account paired with its derived balance, in code order.
    pub async fn trial_balance(&self) -> DbResult<Vec<(Account, Money)>> {
        let accounts = self.list().await?;
        let mut result = Vec::with_capacity(accounts.len());
        for account in accounts {
            let entries = self.entries_for_account(&account.id).await?;
            let balance = account_balance(account.account_type, &entries);
            result.push((account, balance));
        }
        Ok(result)
    }

    async fn entries_for_transaction(&self, transaction_id: &str) -> DbResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT account_id, debit_cents, credit_cents
            FROM journal_entries WHERE transaction_id = ?1
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    fn assemble(
        &self,
        row: TransactionRow,
        entries: Vec<JournalEntry>,
    ) -> DbResult<AccountingTransaction> {
        AccountingTransaction::new(
            row.id,
            row.date,
            row.description,
            row.reference_id,
            row.reference_type,
            entries,
        )
        .map_err(|e| DbError::Internal(format!("Stored posting failed validation: {e}")))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use duka_core::ledger::accounts;
    use duka_core::{AccountingTransaction, JournalEntry, Money, ReferenceType};

    #[tokio::test]
    async fn posting_round_trips_and_balances_derive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.accounts();

        let tx = AccountingTransaction::new(
            "trans_test_1",
            Utc::now(),
            "Cash sale",
            "sale_1",
            ReferenceType::Sale,
            vec![
                JournalEntry::debit(accounts::CASH, Money::from_cents(11_600)),
                JournalEntry::credit(accounts::SALES, Money::from_cents(10_000)),
                JournalEntry::credit(accounts::VAT_PAYABLE, Money::from_cents(1_600)),
            ],
        )
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        repo.insert_transaction(&mut conn, &tx).await.unwrap();
        drop(conn);

        let loaded = repo.get_transaction("trans_test_1").await.unwrap();
        assert_eq!(loaded.entries.len(), 3);
        assert_eq!(loaded.debit_total().cents(), 11_600);

        // Balances read normal-positive for each class
        assert_eq!(repo.balance(accounts::CASH).await.unwrap().cents(), 11_600);
        assert_eq!(repo.balance(accounts::SALES).await.unwrap().cents(), 10_000);
        assert_eq!(
            repo.balance(accounts::VAT_PAYABLE).await.unwrap().cents(),
            1_600
        );
    }

    #[tokio::test]
    async fn reference_lookup_returns_every_posting_for_a_document() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.accounts();

        let original = AccountingTransaction::new(
            "trans_ref_1",
            Utc::now(),
            "Shift float",
            "shift_1",
            ReferenceType::Shift,
            vec![
                JournalEntry::debit(accounts::SHIFT_FLOAT_CLEARING, Money::from_cents(50_000)),
                JournalEntry::credit(accounts::CASH, Money::from_cents(50_000)),
            ],
        )
        .unwrap();
        let reversal = AccountingTransaction::new(
            "trans_ref_2",
            Utc::now(),
            "Shift float returned",
            "shift_1",
            ReferenceType::Shift,
            original.reversal_entries(),
        )
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        repo.insert_transaction(&mut conn, &original).await.unwrap();
        repo.insert_transaction(&mut conn, &reversal).await.unwrap();
        drop(conn);

        let postings = repo.transactions_for_reference("shift_1").await.unwrap();
        assert_eq!(postings.len(), 2);
        assert!(postings.iter().any(|t| t.id == "trans_ref_1"));
        assert!(postings.iter().any(|t| t.id == "trans_ref_2"));

        assert!(repo
            .transactions_for_reference("shift_other")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn trial_balance_covers_the_seeded_chart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rows = db.accounts().trial_balance().await.unwrap();

        assert_eq!(rows.len(), 13);
        assert!(rows.iter().all(|(_, balance)| balance.cents() == 0));
    }
}
