//! # duka-engine: Transaction Orchestration for Duka POS
//!
//! The only write path into the three ledgers. Everything above this crate
//! (UI, API handlers) calls one of four services; everything below it
//! (duka-db, duka-core) is mechanism.
//!
//! ## Service Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         duka-engine                                 │
//! │                                                                     │
//! │  ┌───────────────┐   every payment event, any origin                │
//! │  │   Checkout    │──► stock, plans, loyalty, posting, receipt       │
//! │  └───────────────┘    in ONE SQL transaction                        │
//! │                                                                     │
//! │  ┌───────────────┐   open/close drawer, float postings,             │
//! │  │ ShiftService  │──► payouts, reconciliation variance              │
//! │  └───────────────┘                                                  │
//! │                                                                     │
//! │  ┌───────────────┐   layaway / work order / sales order             │
//! │  │  PlanService  │──► creation, reservations, lifecycle             │
//! │  └───────────────┘                                                  │
//! │                                                                     │
//! │  ┌───────────────┐   balanced-or-nothing journal writes,            │
//! │  │ LedgerPoster  │──► reversals; used by the services above         │
//! │  └───────────────┘                                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactional Discipline
//!
//! Every mutating operation stages its writes on one `sqlx` transaction
//! and commits at the end; an error anywhere rolls the whole event back.
//! Reads that feed an operation happen on the pool BEFORE the transaction
//! starts, because the pool may hold a single connection.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod plans;
pub mod poster;
pub mod settings;
pub mod shift;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{Checkout, CheckoutLine, CheckoutRequest, CompletedSale, Tender};
pub use error::{EngineError, EngineResult};
pub use plans::{MaterialInput, OrderLineInput, PlanService};
pub use poster::LedgerPoster;
pub use settings::{AccountMapping, EngineSettings, LoyaltySettings};
pub use shift::ShiftService;
