//! # Money Module
//!
//! Provides the `Money` type for monetary values and `TaxRate` for rates.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every persisted amount is a whole number of cents, so the           │
//! │    invoice identity  grand = subtotal - discount + tax  is exact.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Policy
//! Percentages (tax, percentage discounts) are the only source of fractional
//! cents. They are rounded half away from zero, once, when the derived
//! amount is produced. Sums and products of whole cents are exact.
//!
//! ## Usage
//! ```rust
//! use galaxy_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let doubled = price * 2;             // 21.98
//! let total = price + Money::from_cents(500);
//! assert_eq!(total.cents(), 1599);
//! assert_eq!(doubled.to_string(), "21.98");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in 100%.
pub const BPS_SCALE: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate differences may go negative before
///   clamping; persisted invoice amounts never do
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self - other`, floored at zero.
    ///
    /// Used for change due: `max(0, received - grand_total)`.
    #[inline]
    pub const fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        let diff = self.0.saturating_sub(other.0);
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::money::Money;
    ///
    /// let line_total = Money::from_cents(299).checked_mul_quantity(3);
    /// assert_eq!(line_total, Some(Money::from_cents(897)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Returns `bps / 10000` of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::money::Money;
    ///
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// assert_eq!(Money::from_cents(1000).percentage_bps(825).cents(), 83);
    /// // 50.00 × 10% = 5.00
    /// assert_eq!(Money::from_cents(5000).percentage_bps(1000).cents(), 500);
    /// ```
    ///
    /// Saturates at the i64 bounds. Use [`Money::checked_percentage_bps`]
    /// when the rate may exceed 100%.
    pub fn percentage_bps(&self, bps: u32) -> Money {
        let signed = self.percentage_i128(bps);
        Money(signed.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Like [`Money::percentage_bps`], but `None` when the result does not fit
    /// in i64.
    ///
    /// ```rust
    /// use galaxy_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1000).checked_percentage_bps(500), Some(Money::from_cents(50)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_percentage_bps(20_000), None);
    /// ```
    pub fn checked_percentage_bps(&self, bps: u32) -> Option<Money> {
        i64::try_from(self.percentage_i128(bps)).ok().map(Money)
    }

    fn percentage_i128(&self, bps: u32) -> i128 {
        // i128 keeps the product of any i64 amount and u32 rate in range
        let product = self.0 as i128 * bps as i128;
        let scale = BPS_SCALE as i128;
        let rounded = (product.abs() + scale / 2) / scale;
        if product < 0 {
            -rounded
        } else {
            rounded
        }
    }

    /// Calculates tax on this amount at the given rate.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::money::{Money, TaxRate};
    ///
    /// let tax = Money::from_cents(2000).calculate_tax(TaxRate::from_bps(500));
    /// assert_eq!(tax.cents(), 100); // 20.00 × 5% = 1.00
    /// ```
    #[inline]
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage_bps(rate.bps())
    }

    /// Tax at the given rate, `None` on overflow.
    #[inline]
    pub fn checked_tax(&self, rate: TaxRate) -> Option<Money> {
        self.checked_percentage_bps(rate.bps())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount with two decimals and no currency symbol.
///
/// ## Note
/// Currency symbols and localization belong to the UI / receipt layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 500 bps = 5% and fractional rates
/// such as 8.25% (825 bps) stay integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a whole percentage.
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        TaxRate(pct * 100)
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

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
