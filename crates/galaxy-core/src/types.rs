//! # Domain Types
//!
//! Core domain types used throughout Galaxy POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Invoice     │   │   InvoiceLine   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  product_id     │       │
//! │  │  sku (optional) │   │  invoice_number │   │  name_snapshot  │       │
//! │  │  quantity       │   │  status         │   │  quantity       │       │
//! │  │  price_cents    │   │  grand_total    │   │  unit_amount    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Discount     │   │  InvoiceStatus  │   │    CartLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Amount (cents) │   │  Unpaid         │   │  product_id     │       │
//! │  │  Percentage     │   │  Paid           │   │  quantity       │       │
//! │  │  (bps)          │   └─────────────────┘   │  unit_amount?   │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Invoice lines copy the product name, SKU and buying price at sale time,
//! so later catalog edits never alter historical invoices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{Money, TaxRate, BPS_SCALE};

// =============================================================================
// Product
// =============================================================================

/// A product available for sale. Owned by the product catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Stock Keeping Unit. Unique across the catalog when present.
    pub sku: Option<String>,

    /// On-hand stock. Never negative.
    pub quantity: i64,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Cost in cents (for profit reporting).
    pub buying_price_cents: i64,

    /// Largest allowed markdown from `price_cents`, in basis points.
    pub discount_limit_bps: Option<u32>,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with no SKU, barcode, cost or discount limit.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::{Money, Product};
    ///
    /// let widget = Product::new("p-1", "Widget", Money::from_cents(1000), 3)
    ///     .with_sku("WID-1")
    ///     .with_buying_price(Money::from_cents(600));
    /// assert_eq!(widget.sku.as_deref(), Some("WID-1"));
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money, quantity: i64) -> Self {
        let now = Utc::now();
        Product {
            id: id.into(),
            name: name.into(),
            barcode: None,
            sku: None,
            quantity: quantity.max(0),
            price_cents: price.cents(),
            buying_price_cents: 0,
            discount_limit_bps: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_buying_price(mut self, cost: Money) -> Self {
        self.buying_price_cents = cost.cents();
        self
    }

    pub fn with_discount_limit_bps(mut self, bps: u32) -> Self {
        self.discount_limit_bps = Some(bps);
        self
    }

    /// Returns the selling price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the buying price as Money.
    #[inline]
    pub fn buying_price(&self) -> Money {
        Money::from_cents(self.buying_price_cents)
    }

    /// Lowest unit amount a cashier may charge, given the discount limit.
    ///
    /// Products without a limit return `None` (any non-negative amount).
    ///
    /// ## Example
    /// ```rust,ignore
    /// // price 10.00, limit 15% → at least 8.50
    /// assert_eq!(product.min_unit_amount(), Some(Money::from_cents(850)));
    /// ```
    pub fn min_unit_amount(&self) -> Option<Money> {
        let limit = self.discount_limit_bps?.min(BPS_SCALE);
        Some(self.price().percentage_bps(BPS_SCALE - limit))
    }

    /// Stock left after selling `sold` units, clamped at zero.
    #[inline]
    pub fn quantity_after_sale(&self, sold: i64) -> i64 {
        self.quantity.saturating_sub(sold).max(0)
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Payment status of an invoice.
///
/// Both states are valid at commit time, and an invoice may toggle between
/// them indefinitely. There is no void/cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Amount still owed.
    #[default]
    Unpaid,
    /// Settled.
    Paid,
}

impl InvoiceStatus {
    /// Returns the lowercase name used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Flat amount in cents.
    #[default]
    Amount,
    /// Share of the subtotal in basis points.
    Percentage,
}

/// Invoice-level discount.
///
/// `value` is cents for [`DiscountKind::Amount`] and basis points for
/// [`DiscountKind::Percentage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub kind: DiscountKind,
    pub value: i64,
}

impl Discount {
    /// No discount.
    #[inline]
    pub const fn none() -> Self {
        Discount {
            kind: DiscountKind::Amount,
            value: 0,
        }
    }

    /// Flat discount.
    #[inline]
    pub const fn amount(amount: Money) -> Self {
        Discount {
            kind: DiscountKind::Amount,
            value: amount.cents(),
        }
    }

    /// Percentage discount in basis points (1000 = 10%).
    #[inline]
    pub const fn percentage_bps(bps: i64) -> Self {
        Discount {
            kind: DiscountKind::Percentage,
            value: bps,
        }
    }

    /// Percentage discount in whole percent.
    #[inline]
    pub const fn percent(pct: i64) -> Self {
        Discount::percentage_bps(pct * 100)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One uncommitted line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Product being sold.
    pub product_id: String,

    /// Units sold. Must be > 0.
    pub quantity: i64,

    /// Price charged per unit, in cents.
    /// `None` charges the product's current selling price.
    pub unit_amount_cents: Option<i64>,
}

impl CartLine {
    /// A line charged at the product's current price.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            unit_amount_cents: None,
        }
    }

    /// A line charged at an explicit unit amount.
    pub fn with_unit_amount(product_id: impl Into<String>, quantity: i64, unit_amount: Money) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            unit_amount_cents: Some(unit_amount.cents()),
        }
    }
}

/// Everything about a sale that is not a line item.
///
/// Monetary results (subtotal, tax, grand total) are deliberately absent:
/// they are always recomputed from the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitContext {
    pub discount: Discount,
    pub tax_rate: TaxRate,
    pub status: InvoiceStatus,
    /// Cash handed over, in cents. Only meaningful when paid.
    pub amount_received_cents: Option<i64>,
    /// Opaque customer / flat key. `None` means an anonymous sale.
    pub customer_ref: Option<String>,
    /// Cashier performing the sale.
    pub cashier_id: String,
}

impl CommitContext {
    /// An unpaid, undiscounted, untaxed sale by `cashier_id`.
    pub fn new(cashier_id: impl Into<String>) -> Self {
        CommitContext {
            discount: Discount::none(),
            tax_rate: TaxRate::zero(),
            status: InvoiceStatus::Unpaid,
            amount_received_cents: None,
            customer_ref: None,
            cashier_id: cashier_id.into(),
        }
    }

    pub fn discount(mut self, discount: Discount) -> Self {
        self.discount = discount;
        self
    }

    pub fn tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Marks the sale as paid with the given amount received.
    pub fn paid(mut self, amount_received: Option<Money>) -> Self {
        self.status = InvoiceStatus::Paid;
        self.amount_received_cents = amount_received.map(|m| m.cents());
        self
    }

    pub fn customer(mut self, customer_ref: impl Into<String>) -> Self {
        self.customer_ref = Some(customer_ref.into());
        self
    }
}

// =============================================================================
// Invoice Line
// =============================================================================

/// A line item on a committed invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceLine {
    /// 1-based position within the invoice.
    pub line_no: u32,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: Option<String>,
    pub quantity: i64,
    /// Price charged per unit, in cents.
    pub unit_amount_cents: i64,
    /// Buying price per unit at time of sale (frozen).
    pub buying_price_cents: i64,
    /// quantity × unit_amount_cents.
    pub line_total_cents: i64,
}

impl InvoiceLine {
    #[inline]
    pub fn unit_amount(&self) -> Money {
        Money::from_cents(self.unit_amount_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// Buying cost of the units on this line.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.buying_price_cents.saturating_mul(self.quantity))
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A committed, numbered invoice.
///
/// Lines and monetary fields never change after commit. Only `status`,
/// `paid_at` and `paid_by` move, through a status toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `<prefix><zero-padded counter>`, e.g. `glxy0042`.
    pub invoice_number: String,
    pub number_prefix: String,
    /// Numeric counter behind `invoice_number`.
    /// `None` marks a degraded, timestamp-derived number.
    pub sequence: Option<i64>,
    pub lines: Vec<InvoiceLine>,
    pub discount: Discount,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub amount_received_cents: Option<i64>,
    pub change_cents: i64,
    pub status: InvoiceStatus,
    pub customer_ref: Option<String>,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
}

impl Invoice {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount_amount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }

    #[inline]
    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }

    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// False for numbers produced by the degraded timestamp fallback.
    #[inline]
    pub fn is_sequential(&self) -> bool {
        self.sequence.is_some()
    }

    /// Sum of units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Buying cost of everything sold on this invoice.
    pub fn cost_of_goods(&self) -> Money {
        self.lines.iter().map(InvoiceLine::cost).sum()
    }

    /// Net revenue (subtotal less discount, tax excluded) minus cost.
    pub fn gross_profit(&self) -> Money {
        self.subtotal() - self.discount_amount() - self.cost_of_goods()
    }
}

/// The only fields of a committed invoice that may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusChange {
    pub status: InvoiceStatus,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
}

impl StatusChange {
    /// Applies this change to an invoice in place.
    pub fn apply_to(&self, invoice: &mut Invoice) {
        invoice.status = self.status;
        invoice.paid_at = self.paid_at;
        invoice.paid_by = self.paid_by.clone();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price_cents: i64, limit: Option<u32>) -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Widget".to_string(),
            barcode: None,
            sku: Some("WID-1".to_string()),
            quantity: 3,
            price_cents,
            buying_price_cents: 600,
            discount_limit_bps: limit,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_min_unit_amount() {
        assert_eq!(product(1000, None).min_unit_amount(), None);
        assert_eq!(
            product(1000, Some(1500)).min_unit_amount(),
            Some(Money::from_cents(850))
        );
        // Limits above 100% behave like 100%
        assert_eq!(
            product(1000, Some(20000)).min_unit_amount(),
            Some(Money::zero())
        );
    }

    #[test]
    fn test_quantity_after_sale_clamps_at_zero() {
        let p = product(1000, None);
        assert_eq!(p.quantity_after_sale(2), 1);
        assert_eq!(p.quantity_after_sale(5), 0);
    }

    #[test]
    fn test_invoice_status_default_and_display() {
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::Paid.to_string(), "paid");
    }

    #[test]
    fn test_discount_constructors() {
        assert_eq!(Discount::none().value, 0);
        assert_eq!(Discount::percent(10), Discount::percentage_bps(1000));
        assert_eq!(Discount::amount(Money::from_cents(250)).kind, DiscountKind::Amount);
    }

    #[test]
    fn test_commit_context_builder() {
        let ctx = CommitContext::new("ali")
            .tax_rate(TaxRate::from_percent(5))
            .paid(Some(Money::from_cents(5000)))
            .customer("B-12/4");

        assert_eq!(ctx.status, InvoiceStatus::Paid);
        assert_eq!(ctx.amount_received_cents, Some(5000));
        assert_eq!(ctx.customer_ref.as_deref(), Some("B-12/4"));
        assert_eq!(ctx.tax_rate.bps(), 500);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&InvoiceStatus::Unpaid).unwrap();
        assert_eq!(json, "\"unpaid\"");
    }
}
