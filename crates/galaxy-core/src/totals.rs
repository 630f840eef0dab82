//! # Invoice Totals
//!
//! Turns line amounts, a discount and a tax rate into the four derived
//! figures stored on every invoice.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   lines ──► subtotal = Σ quantity × unit_amount        (exact)         │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │   discount ──► discount = amount | subtotal × bps      (rounded once)  │
//! │                 │        clamped to ≤ subtotal                          │
//! │                 ▼                                                       │
//! │   tax_rate ──► tax = (subtotal - discount) × bps       (rounded once)  │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │            grand_total = subtotal - discount + tax     (exact)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because only the two percentage steps round, and they round to whole
//! cents, the grand total identity holds exactly. Over-discounts never
//! fail: the discount is clamped to the subtotal and the result carries
//! `discount_clamped = true`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, TaxRate, BPS_SCALE};
use crate::types::{Discount, DiscountKind};
use crate::validation::{validate_discount, validate_quantity, validate_unit_amount, ValidationResult};

// =============================================================================
// Inputs
// =============================================================================

/// Quantity and unit amount of one line, the only line data totals need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: i64,
    pub unit_amount: Money,
}

impl LineAmount {
    #[inline]
    pub const fn new(quantity: i64, unit_amount: Money) -> Self {
        LineAmount {
            quantity,
            unit_amount,
        }
    }

    /// quantity × unit_amount, or an overflow error.
    pub fn line_total(&self) -> ValidationResult<Money> {
        self.unit_amount
            .checked_mul_quantity(self.quantity)
            .ok_or_else(|| ValidationError::overflow("line total"))
    }
}

// =============================================================================
// Output
// =============================================================================

/// Derived monetary figures of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    /// Discount actually applied (after clamping).
    pub discount: Money,
    pub tax_rate: TaxRate,
    pub tax: Money,
    pub grand_total: Money,
    /// True when the requested discount exceeded the subtotal.
    pub discount_clamped: bool,
}

impl InvoiceTotals {
    /// Amount the tax is charged on.
    #[inline]
    pub fn taxable(&self) -> Money {
        self.subtotal - self.discount
    }

    /// Change due for `received`, never negative.
    #[inline]
    pub fn change_for(&self, received: Money) -> Money {
        received.saturating_sub_floor_zero(self.grand_total)
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Computes subtotal, discount, tax and grand total.
///
/// ## Errors
/// - [`ValidationError::EmptyCart`] when `lines` is empty
/// - quantity ≤ 0, negative unit amount, negative discount value,
///   percentage above 100%
/// - [`ValidationError::Overflow`] when the sums do not fit in i64 cents
///
/// ## Example
/// ```rust
/// use galaxy_core::money::{Money, TaxRate};
/// use galaxy_core::totals::{compute_totals, LineAmount};
/// use galaxy_core::types::Discount;
///
/// let lines = [LineAmount::new(1, Money::from_cents(5000))];
/// let totals = compute_totals(&lines, Discount::percent(10), TaxRate::zero()).unwrap();
///
/// assert_eq!(totals.discount.cents(), 500);
/// assert_eq!(totals.grand_total.cents(), 4500);
/// ```
pub fn compute_totals(
    lines: &[LineAmount],
    discount: Discount,
    tax_rate: TaxRate,
) -> ValidationResult<InvoiceTotals> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }
    validate_discount(&discount)?;

    let mut subtotal = Money::zero();
    for line in lines {
        validate_quantity(line.quantity)?;
        validate_unit_amount(line.unit_amount)?;
        subtotal = subtotal
            .checked_add(line.line_total()?)
            .ok_or_else(|| ValidationError::overflow("subtotal"))?;
    }

    let requested = match discount.kind {
        DiscountKind::Amount => Money::from_cents(discount.value),
        // validate_discount bounds the value to 0..=BPS_SCALE
        DiscountKind::Percentage => subtotal.percentage_bps(discount.value as u32),
    };
    let discount_clamped = requested > subtotal;
    let discount_amount = if discount_clamped { subtotal } else { requested };

    let taxable = subtotal - discount_amount;
    let tax = taxable
        .checked_tax(tax_rate)
        .ok_or_else(|| ValidationError::overflow("tax"))?;
    let grand_total = taxable
        .checked_add(tax)
        .ok_or_else(|| ValidationError::overflow("grand total"))?;

    Ok(InvoiceTotals {
        subtotal,
        discount: discount_amount,
        tax_rate,
        tax,
        grand_total,
        discount_clamped,
    })
}

/// Largest percentage discount, in basis points.
pub const MAX_DISCOUNT_BPS: i64 = BPS_SCALE as i64;

// =============================================================================
// Unit Tests
// =============================================================================
