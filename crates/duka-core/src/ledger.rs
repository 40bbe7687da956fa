//! # General Ledger Types
//!
//! Double-entry accounting primitives: accounts, journal entries, and the
//! balanced transaction record.
//!
//! ## The One Hard Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Σ debit == Σ credit  (within BALANCE_TOLERANCE_CENTS)              │
//! │                                                                     │
//! │  Enforced at construction: AccountingTransaction::new refuses to    │
//! │  build an unbalanced value, so nothing downstream (repository,     │
//! │  poster, reports) ever needs to re-check it.                        │
//! │                                                                     │
//! │  Corrections are posted as NEW transactions - never edits. The     │
//! │  ledger is append-only and account balances are always derived,    │
//! │  never stored.                                                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Account Type
// =============================================================================

/// The five account classes of the chart of accounts.
///
/// Assets and Expenses carry a debit-normal balance; everything else is
/// credit-normal and gets sign-flipped when a balance is derived, so all
/// balances read "normal positive" for their type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Assets,
    Liabilities,
    Revenue,
    ContraRevenue,
    Expenses,
}

impl AccountType {
    /// Whether the raw `Σ(debit - credit)` already reads as a positive
    /// balance for this account class.
    #[inline]
    pub const fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Assets | AccountType::Expenses)
    }
}

// =============================================================================
// Account
// =============================================================================

/// An account in the chart of accounts.
///
/// The chart is seeded once and treated as immutable reference data; the
/// `is_editable` flag exists so user-added accounts (none in the seed) can
/// be distinguished from system accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: String,
    /// Numeric ledger code ("1000", "4000", ...), unique.
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_editable: bool,
}

// =============================================================================
// Journal Entry
// =============================================================================

/// One line of a transaction.
///
/// Exactly one of debit/credit is normally non-zero, but both are carried
/// as separate fields (not a signed amount) to match ledger convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JournalEntry {
    pub account_id: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
}

impl JournalEntry {
    /// A pure debit line.
    pub fn debit(account_id: impl Into<String>, amount: Money) -> Self {
        JournalEntry {
            account_id: account_id.into(),
            debit_cents: amount.cents(),
            credit_cents: 0,
        }
    }

    /// A pure credit line.
    pub fn credit(account_id: impl Into<String>, amount: Money) -> Self {
        JournalEntry {
            account_id: account_id.into(),
            debit_cents: 0,
            credit_cents: amount.cents(),
        }
    }
}

// =============================================================================
// Reference Type
// =============================================================================

/// What kind of source document a transaction points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    Shift,
    WorkOrder,
    SalesOrder,
    Layaway,
    Adjustment,
}

// =============================================================================
// Accounting Transaction
// =============================================================================

/// A balanced, append-only ledger posting.
///
/// Construction is the enforcement point: `new` validates that entries are
/// non-empty and that debits equal credits within the one-cent tolerance.
/// Once built, the value is never mutated - corrections are new postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingTransaction {
    pub id: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub entries: Vec<JournalEntry>,
}

impl AccountingTransaction {
    /// Builds a transaction, failing fast if the entries do not balance.
    pub fn new(
        id: impl Into<String>,
        date: DateTime<Utc>,
        description: impl Into<String>,
        reference_id: impl Into<String>,
        reference_type: ReferenceType,
        entries: Vec<JournalEntry>,
    ) -> CoreResult<Self> {
        if entries.is_empty() {
            return Err(CoreError::EmptyTransaction);
        }

        let debits: Money = entries
            .iter()
            .map(|e| Money::from_cents(e.debit_cents))
            .sum();
        let credits: Money = entries
            .iter()
            .map(|e| Money::from_cents(e.credit_cents))
            .sum();

        if !debits.balances_with(credits) {
            return Err(CoreError::UnbalancedTransaction {
                debit_cents: debits.cents(),
                credit_cents: credits.cents(),
            });
        }

        Ok(AccountingTransaction {
            id: id.into(),
            date,
            description: description.into(),
            reference_id: reference_id.into(),
            reference_type,
            entries,
        })
    }

    /// Sum of all debit lines.
    pub fn debit_total(&self) -> Money {
        self.entries
            .iter()
            .map(|e| Money::from_cents(e.debit_cents))
            .sum()
    }

    /// Sum of all credit lines.
    pub fn credit_total(&self) -> Money {
        self.entries
            .iter()
            .map(|e| Money::from_cents(e.credit_cents))
            .sum()
    }

    /// Builds the equal-and-opposite posting (debits and credits swapped).
    /// Used for the shift-float reversal at close.
    pub fn reversal_entries(&self) -> Vec<JournalEntry> {
        self.entries
            .iter()
            .map(|e| JournalEntry {
                account_id: e.account_id.clone(),
                debit_cents: e.credit_cents,
                credit_cents: e.debit_cents,
            })
            .collect()
    }
}

// =============================================================================
// Balance Derivation
// =============================================================================

/// Derives an account's balance from the journal entries that touch it.
///
/// Raw movement is `Σ(debit - credit)`; credit-normal account classes
/// (everything outside Assets/Expenses) flip the sign so the balance reads
/// normal-positive.
pub fn account_balance<'a>(
    account_type: AccountType,
    entries: impl IntoIterator<Item = &'a JournalEntry>,
) -> Money {
    let raw: Money = entries
        .into_iter()
        .map(|e| Money::from_cents(e.debit_cents - e.credit_cents))
        .sum();

    if account_type.is_debit_normal() {
        raw
    } else {
        -raw
    }
}

// =============================================================================
// Chart of Accounts Seed
// =============================================================================

/// Well-known system account ids. The seed uses stable ids so the account
/// mapping configuration can reference them without a lookup.
pub mod accounts {
    pub const CASH: &str = "acc_cash";
    pub const MPESA: &str = "acc_mpesa";
    pub const CARD_CLEARING: &str = "acc_card_clearing";
    pub const BANK: &str = "acc_bank";
    pub const INVENTORY: &str = "acc_inventory";
    pub const SHIFT_FLOAT_CLEARING: &str = "acc_shift_float_clearing";
    pub const ACCOUNTS_PAYABLE: &str = "acc_accounts_payable";
    pub const VAT_PAYABLE: &str = "acc_vat_payable";
    pub const CUSTOMER_DEPOSITS: &str = "acc_customer_deposits";
    pub const SALES: &str = "acc_sales";
    pub const SALES_DISCOUNTS: &str = "acc_sales_discounts";
    pub const COGS: &str = "acc_cogs";
    pub const OPERATING_EXPENSES: &str = "acc_operating_expenses";
}

/// The fixed chart of accounts, seeded once at first run.
pub fn default_chart_of_accounts() -> Vec<Account> {
    fn acc(id: &str, code: &str, name: &str, account_type: AccountType) -> Account {
        Account {
            id: id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            is_editable: false,
        }
    }

    vec![
        acc(accounts::CASH, "1000", "Cash", AccountType::Assets),
        acc(accounts::MPESA, "1010", "M-Pesa", AccountType::Assets),
        acc(accounts::CARD_CLEARING, "1020", "Card Clearing", AccountType::Assets),
        acc(accounts::BANK, "1030", "Bank", AccountType::Assets),
        acc(accounts::INVENTORY, "1200", "Inventory Asset", AccountType::Assets),
        acc(
            accounts::ACCOUNTS_PAYABLE,
            "2000",
            "Accounts Payable",
            AccountType::Liabilities,
        ),
        acc(
            accounts::SHIFT_FLOAT_CLEARING,
            "2100",
            "Shift Float Clearing",
            AccountType::Liabilities,
        ),
        acc(accounts::VAT_PAYABLE, "2200", "VAT Payable", AccountType::Liabilities),
        acc(
            accounts::CUSTOMER_DEPOSITS,
            "2300",
            "Customer Deposits",
            AccountType::Liabilities,
        ),
        acc(accounts::SALES, "4000", "Sales Revenue", AccountType::Revenue),
        acc(
            accounts::SALES_DISCOUNTS,
            "4100",
            "Sales Discounts",
            AccountType::ContraRevenue,
        ),
        acc(accounts::COGS, "5000", "Cost of Goods Sold", AccountType::Expenses),
        acc(
            accounts::OPERATING_EXPENSES,
            "6000",
            "Operating Expenses",
            AccountType::Expenses,
        ),
    ]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(lines: &[(&str, i64, i64)]) -> Vec<JournalEntry> {
        lines
            .iter()
            .map(|(acc, d, c)| JournalEntry {
                account_id: acc.to_string(),
                debit_cents: *d,
                credit_cents: *c,
            })
            .collect()
    }

    #[test]
    fn balanced_transaction_builds() {
        let tx = AccountingTransaction::new(
            "trans_1",
            Utc::now(),
            "Sale",
            "sale_1",
            ReferenceType::Sale,
            entries(&[(accounts::CASH, 11_600, 0), (accounts::SALES, 0, 10_000), (
                accounts::VAT_PAYABLE,
                0,
                1600,
            )]),
        )
        .unwrap();

        assert_eq!(tx.debit_total().cents(), 11_600);
        assert_eq!(tx.credit_total().cents(), 11_600);
    }

    #[test]
    fn unbalanced_transaction_rejected() {
        let err = AccountingTransaction::new(
            "trans_2",
            Utc::now(),
            "Bad",
            "sale_2",
            ReferenceType::Sale,
            entries(&[(accounts::CASH, 1000, 0), (accounts::SALES, 0, 900)]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::UnbalancedTransaction {
                debit_cents: 1000,
                credit_cents: 900
            }
        ));
    }

    #[test]
    fn one_cent_drift_tolerated() {
        // Rounding can leave a one-cent gap; policy says that balances.
        let tx = AccountingTransaction::new(
            "trans_3",
            Utc::now(),
            "Rounded",
            "sale_3",
            ReferenceType::Sale,
            entries(&[(accounts::CASH, 1000, 0), (accounts::SALES, 0, 999)]),
        );
        assert!(tx.is_ok());
    }

    #[test]
    fn empty_entries_rejected() {
        let err = AccountingTransaction::new(
            "trans_4",
            Utc::now(),
            "Empty",
            "sale_4",
            ReferenceType::Sale,
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::EmptyTransaction));
    }

    #[test]
    fn balance_sign_flips_for_credit_normal() {
        let lines = entries(&[(accounts::SALES, 0, 10_000)]);
        // Revenue: credit of 10_000 reads as +10_000
        assert_eq!(
            account_balance(AccountType::Revenue, &lines).cents(),
            10_000
        );
        // Same entries viewed as an asset would read -10_000
        assert_eq!(
            account_balance(AccountType::Assets, &lines).cents(),
            -10_000
        );
    }

    #[test]
    fn posting_plus_reversal_returns_to_zero() {
        let tx = AccountingTransaction::new(
            "trans_5",
            Utc::now(),
            "Float",
            "shift_1",
            ReferenceType::Shift,
            entries(&[
                (accounts::SHIFT_FLOAT_CLEARING, 100_000, 0),
                (accounts::CASH, 0, 100_000),
            ]),
        )
        .unwrap();

        let reversal = tx.reversal_entries();
        let all: Vec<JournalEntry> = tx.entries.iter().cloned().chain(reversal).collect();

        let cash: Vec<&JournalEntry> = all.iter().filter(|e| e.account_id == accounts::CASH).collect();
        assert_eq!(account_balance(AccountType::Assets, cash).cents(), 0);

        let clearing: Vec<&JournalEntry> = all
            .iter()
            .filter(|e| e.account_id == accounts::SHIFT_FLOAT_CLEARING)
            .collect();
        assert_eq!(account_balance(AccountType::Assets, clearing).cents(), 0);
    }

    #[test]
    fn chart_seed_has_unique_codes() {
        let chart = default_chart_of_accounts();
        let mut codes: Vec<&str> = chart.iter().map(|a| a.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), chart.len());
        assert!(chart.iter().all(|a| !a.is_editable));
    }
}
