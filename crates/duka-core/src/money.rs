//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  A ledger that compares float sums needs an epsilon everywhere.    │
//! │                                                                     │
//! │  OUR SOLUTION: Integer Cents                                        │
//! │    Every amount is an i64 count of the smallest currency unit.     │
//! │    The old 0.01-unit epsilon collapses to exactly one cent,        │
//! │    owned by BALANCE_TOLERANCE_CENTS below.                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::money::Money;
//!
//! let price = Money::from_cents(10_000); // KSh 100.00
//! let line = price * 3;                  // KSh 300.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Tolerance Policy
// =============================================================================

/// Maximum permitted |Σdebit − Σcredit| for a transaction to count as
/// balanced.
///
/// The source system compared floating-point sums within 0.01 currency
/// units. With integer cents that tolerance is exactly one cent, and every
/// balance comparison in the workspace goes through this single constant.
pub const BALANCE_TOLERANCE_CENTS: i64 = 1;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values are legal (variances, reversals)
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No float constructor**: amounts enter the system as cents, period
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps a negative value up to zero. Used where a counter must never
    /// go below zero (reserved stock release, change computation).
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Two amounts are considered equal when they differ by no more than
    /// [`BALANCE_TOLERANCE_CENTS`].
    #[inline]
    pub const fn balances_with(&self, other: Money) -> bool {
        (self.0 - other.0).abs() <= BALANCE_TOLERANCE_CENTS
    }

    /// Extracts the VAT portion from a tax-inclusive amount.
    ///
    /// Shelf prices include VAT, so for a flat rate `r` (in basis points)
    /// the tax hidden inside `total` is `total × r / (10000 + r)`, rounded
    /// half-up. The taxable base is what remains:
    ///
    /// ```text
    /// Total paid:   KSh 116.00   (shelf price, VAT inclusive)
    ///      │
    ///      ▼
    /// vat_portion(16%)  = KSh 16.00   → credited to VAT Payable
    /// taxable           = KSh 100.00  → credited to Sales
    /// ```
    pub fn vat_portion(&self, rate: TaxRate) -> Money {
        if rate.is_zero() {
            return Money::zero();
        }
        // i128 intermediate to prevent overflow on large amounts
        let divisor = 10_000i128 + rate.bps() as i128;
        let tax = (self.0 as i128 * rate.bps() as i128 + divisor / 2) / divisor;
        Money::from_cents(tax as i64)
    }

    /// The tax-exclusive remainder of a tax-inclusive amount.
    #[inline]
    pub fn taxable_portion(&self, rate: TaxRate) -> Money {
        *self - self.vat_portion(rate)
    }
}

impl fmt::Display for Money {
    /// Debug-friendly format. UI formatting is the presentation layer's job.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}KSh {}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Flat VAT rate in basis points (bps).
///
/// 1 basis point = 0.01%, so 1600 bps = 16% (Kenyan standard VAT).
/// The system carries exactly one flat rate; there is no jurisdiction
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        // Kenyan standard VAT
        TaxRate(1600)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
