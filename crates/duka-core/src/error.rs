//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  duka-core errors (this file)                                       │
//! │  ├── CoreError        - Ledger / stock / plan rule violations       │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  duka-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  duka-engine errors (separate crate)                                │
//! │  └── EngineError      - Orchestration failures (wraps both)         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, balance, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A transaction whose debits and credits do not balance.
    ///
    /// This is the one "must never happen" class: the constructor refuses
    /// to produce the value, so an unbalanced transaction can never reach
    /// persistence.
    #[error("Unbalanced transaction: debits {debit_cents} vs credits {credit_cents}")]
    UnbalancedTransaction { debit_cents: i64, credit_cents: i64 },

    /// A transaction must carry at least one journal entry.
    #[error("Transaction has no journal entries")]
    EmptyTransaction,

    /// Not enough unreserved units to satisfy a reservation or deduction.
    ///
    /// ## When This Occurs
    /// - Reserving work-order materials beyond `stock - reserved_stock`
    /// - A point-of-sale deduction that would drive `stock` negative
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Completing a sale requires an open shift.
    #[error("No active shift")]
    NoActiveShift,

    /// One active shift per operator at a time.
    #[error("User {user_id} already has an active shift")]
    ShiftAlreadyActive { user_id: String },

    /// Closing operations are gated on `status == active`; closing twice
    /// would double-reverse the float posting.
    #[error("Shift {shift_id} is not active")]
    ShiftNotActive { shift_id: String },

    /// A deferred-payment plan in a terminal state refuses further payments.
    #[error("{plan} {id} is {status}, no further payments accepted")]
    PlanClosed {
        plan: &'static str,
        id: String,
        status: String,
    },

    /// A work order cannot be marked Completed while money is still owed.
    #[error("Work order {id} has balance due of {balance_due_cents} cents, cannot complete")]
    BalanceStillDue { id: String, balance_due_cents: i64 },

    /// Illegal state-machine transition.
    #[error("{entity} cannot transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Tendered payments (plus redeemed points) do not cover the total.
    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "prod_1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for prod_1: available 3, requested 5"
        );

        let err = CoreError::UnbalancedTransaction {
            debit_cents: 1000,
            credit_cents: 900,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("900"));
    }

    #[test]
    fn validation_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "total".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
