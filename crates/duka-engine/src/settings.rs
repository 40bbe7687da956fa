//! # Engine Settings
//!
//! Configuration the engine consumes but does not manage: the account
//! mapping, the loyalty programme parameters and the flat VAT rate. The
//! settings UI is out of scope; this module is the read side.
//!
//! ## Degraded Mode
//! Every account id in [`AccountMapping`] is optional. When a posting
//! needs an account that is not configured, the engine skips that posting
//! whole (with a `warn!`) and carries on - accounting becomes advisory,
//! sales keep flowing. A partially-written posting is never an option
//! because it could not balance.

use serde::{Deserialize, Serialize};

use duka_core::ledger::accounts;
use duka_core::{PaymentMethod, TaxRate};

// =============================================================================
// Account Mapping
// =============================================================================

/// Which ledger account each engine concern posts to.
///
/// All fields optional; `Default` wires them to the seeded chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMapping {
    pub cash: Option<String>,
    pub mpesa: Option<String>,
    pub card: Option<String>,
    pub bank: Option<String>,
    pub sales: Option<String>,
    pub vat_payable: Option<String>,
    pub cogs: Option<String>,
    pub inventory: Option<String>,
    pub customer_deposits: Option<String>,
    pub shift_float_clearing: Option<String>,
    pub operating_expenses: Option<String>,
}

impl Default for AccountMapping {
    fn default() -> Self {
        AccountMapping {
            cash: Some(accounts::CASH.to_string()),
            mpesa: Some(accounts::MPESA.to_string()),
            card: Some(accounts::CARD_CLEARING.to_string()),
            bank: Some(accounts::BANK.to_string()),
            sales: Some(accounts::SALES.to_string()),
            vat_payable: Some(accounts::VAT_PAYABLE.to_string()),
            cogs: Some(accounts::COGS.to_string()),
            inventory: Some(accounts::INVENTORY.to_string()),
            customer_deposits: Some(accounts::CUSTOMER_DEPOSITS.to_string()),
            shift_float_clearing: Some(accounts::SHIFT_FLOAT_CLEARING.to_string()),
            operating_expenses: Some(accounts::OPERATING_EXPENSES.to_string()),
        }
    }
}

impl AccountMapping {
    /// An entirely unconfigured mapping; every posting degrades to a skip.
    pub fn unconfigured() -> Self {
        AccountMapping {
            cash: None,
            mpesa: None,
            card: None,
            bank: None,
            sales: None,
            vat_payable: None,
            cogs: None,
            inventory: None,
            customer_deposits: None,
            shift_float_clearing: None,
            operating_expenses: None,
        }
    }

    /// The asset account a payment method settles into.
    pub fn for_method(&self, method: PaymentMethod) -> Option<&str> {
        match method {
            PaymentMethod::Cash => self.cash.as_deref(),
            PaymentMethod::Mpesa => self.mpesa.as_deref(),
            PaymentMethod::Card => self.card.as_deref(),
            PaymentMethod::BankTransfer => self.bank.as_deref(),
        }
    }
}

// =============================================================================
// Loyalty Settings
// =============================================================================

/// Loyalty programme parameters.
///
/// Earned points: `floor(amount_cents / earn_cents_per_point)`.
/// Redeemed points pay `redeem_cents_per_point` each towards the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySettings {
    pub enabled: bool,
    /// Cents of spend per point earned. Default: 10_000 (1 point / KSh 100).
    pub earn_cents_per_point: i64,
    /// Cents of value per point redeemed. Default: 100 (KSh 1 / point).
    pub redeem_cents_per_point: i64,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            enabled: true,
            earn_cents_per_point: 10_000,
            redeem_cents_per_point: 100,
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Everything the engine needs to know beyond what the database holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub accounts: AccountMapping,
    pub loyalty: LoyaltySettings,
    /// Flat VAT rate; totals are tax-inclusive.
    pub tax_rate: TaxRate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_covers_every_method() {
        let mapping = AccountMapping::default();
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Mpesa,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
        ] {
            assert!(mapping.for_method(method).is_some());
        }
    }

    #[test]
    fn unconfigured_mapping_is_empty() {
        let mapping = AccountMapping::unconfigured();
        assert!(mapping.for_method(PaymentMethod::Cash).is_none());
        assert!(mapping.sales.is_none());
    }
}
