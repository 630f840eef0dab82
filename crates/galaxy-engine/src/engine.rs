//! # Invoice Engine
//!
//! Orchestrates a sale against the two collaborators.
//!
//! ## Numbering Under Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Terminal A                          Terminal B                         │
//! │  ──────────                          ──────────                         │
//! │  highest → glxy0041                  highest → glxy0041                 │
//! │  append glxy0042  ✓                                                     │
//! │                                      append glxy0042  ✗ Conflict        │
//! │                                      highest → glxy0042  (re-read)      │
//! │                                      append glxy0043  ✓                 │
//! │                                                                         │
//! │  Within one engine the commit lock serializes allocate+append.        │
//! │  Across engines the store's uniqueness check decides, and the loser   │
//! │  retries up to numbering.max_attempts before StoreUnavailable.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Side Effects
//! Validation and catalog lookups happen before anything is written. Once
//! the invoice is appended it is the source of truth: stock decrements that
//! fail afterwards are logged and never undo the invoice.

use chrono::Utc;
use galaxy_core::numbering::{degraded_number, next_after};
use galaxy_core::validation::{
    validate_actor, validate_amount_received, validate_cart_size, validate_discount,
    validate_quantity, validate_unit_amount,
};
use galaxy_core::{
    compute_totals, CartLine, CommitContext, Discount, Invoice, InvoiceLine, InvoiceStatus,
    InvoiceTotals, LineAmount, Money, Product, StatusChange, TaxRate, ValidationError,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::catalog::ProductCatalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::report::{sales_summary, SalesSummary, SummaryFilter};
use crate::store::{InvoiceStore, StoreError};

// =============================================================================
// Allocated Number
// =============================================================================

/// An invoice number computed from the store's current highest number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedNumber {
    pub invoice_number: String,
    /// `None` for a degraded, timestamp-derived number.
    pub sequence: Option<i64>,
}

impl AllocatedNumber {
    pub fn is_degraded(&self) -> bool {
        self.sequence.is_none()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The invoice engine.
///
/// ## Usage
/// ```rust,ignore
/// let engine = InvoiceEngine::new(catalog, store, EngineConfig::default());
///
/// let invoice = engine
///     .commit_invoice(&[CartLine::new("p-1", 2)], CommitContext::new("ali"))
///     .await?;
///
/// let paid = engine
///     .toggle_status(&invoice.id, InvoiceStatus::Paid, "ali")
///     .await?;
/// ```
pub struct InvoiceEngine<C, S> {
    catalog: C,
    store: S,
    config: EngineConfig,
    /// Serializes allocate+append within this engine.
    commit_lock: Mutex<()>,
}

impl<C, S> InvoiceEngine<C, S>
where
    C: ProductCatalog,
    S: InvoiceStore,
{
    pub fn new(catalog: C, store: S, config: EngineConfig) -> Self {
        InvoiceEngine {
            catalog,
            store,
            config,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A commit context for `cashier_id` using the configured default tax rate.
    pub fn context_for(&self, cashier_id: impl Into<String>) -> CommitContext {
        CommitContext::new(cashier_id).tax_rate(self.config.sales.default_tax_rate())
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Computes invoice figures without touching either collaborator.
    pub fn compute_totals(
        &self,
        lines: &[LineAmount],
        discount: Discount,
        tax_rate: TaxRate,
    ) -> EngineResult<InvoiceTotals> {
        Ok(compute_totals(lines, discount, tax_rate)?)
    }

    // =========================================================================
    // Numbering
    // =========================================================================

    /// Returns the number the next commit would receive.
    ///
    /// The number is reserved only when an invoice carrying it is appended;
    /// [`commit_invoice`](Self::commit_invoice) allocates again under its
    /// lock.
    ///
    /// ## Errors
    /// - `StoreUnavailable` when the store cannot be read (unless degraded
    ///   numbering is enabled) or holds a number that does not parse
    pub async fn allocate_invoice_number(&self) -> EngineResult<AllocatedNumber> {
        let _guard = self.commit_lock.lock().await;
        self.next_number().await
    }

    async fn next_number(&self) -> EngineResult<AllocatedNumber> {
        let numbering = &self.config.numbering;

        match self.store.highest_number(&numbering.prefix).await {
            Ok(highest) => {
                let next = next_after(highest.as_deref(), &numbering.prefix)?;
                debug!(
                    highest = ?highest,
                    next = next.sequence(),
                    "Allocated invoice number"
                );
                Ok(AllocatedNumber {
                    invoice_number: next.format(numbering.min_width),
                    sequence: Some(next.sequence()),
                })
            }
            Err(err) if numbering.allow_degraded => {
                let invoice_number = degraded_number(&numbering.prefix, Utc::now());
                warn!(
                    error = %err,
                    invoice_number = %invoice_number,
                    "Store unreadable, issuing non-sequential invoice number"
                );
                Ok(AllocatedNumber {
                    invoice_number,
                    sequence: None,
                })
            }
            Err(err) => {
                error!(error = %err, "Failed to read highest invoice number");
                Err(EngineError::StoreUnavailable(err.to_string()))
            }
        }
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Validates, numbers and persists a cart, then decrements stock.
    ///
    /// ## Steps
    /// 1. Validate the cart and context, load every product
    /// 2. Compute totals (over-discount is clamped)
    /// 3. Allocate a number and append, retrying on number conflicts
    /// 4. Decrement stock per line, clamped at 0
    ///
    /// ## Errors
    /// - `Validation`: empty cart, unknown product, bad quantity, amount,
    ///   discount or cashier. Nothing is written.
    /// - `StoreUnavailable`: catalog/store failure before or during append.
    ///   Nothing is written and no number is consumed.
    pub async fn commit_invoice(
        &self,
        cart: &[CartLine],
        context: CommitContext,
    ) -> EngineResult<Invoice> {
        validate_cart_size(cart.len())?;
        let cashier_id = validate_actor("cashier_id", &context.cashier_id)?;
        validate_discount(&context.discount)?;
        let amount_received = context.amount_received_cents.map(Money::from_cents);
        if let Some(received) = amount_received {
            validate_amount_received(received)?;
        }

        let mut lines = Vec::with_capacity(cart.len());
        let mut amounts = Vec::with_capacity(cart.len());
        for (idx, item) in cart.iter().enumerate() {
            validate_quantity(item.quantity)?;
            let product = self.load_product(&item.product_id).await?;
            let unit_amount = item
                .unit_amount_cents
                .map(Money::from_cents)
                .unwrap_or_else(|| product.price());
            validate_unit_amount(unit_amount)?;
            self.check_discount_limit(&product, unit_amount)?;

            let amount = LineAmount::new(item.quantity, unit_amount);
            let line_total = amount.line_total()?;
            amounts.push(amount);
            lines.push(InvoiceLine {
                line_no: idx as u32 + 1,
                product_id: product.id,
                name_snapshot: product.name,
                sku_snapshot: product.sku,
                quantity: item.quantity,
                unit_amount_cents: unit_amount.cents(),
                buying_price_cents: product.buying_price_cents,
                line_total_cents: line_total.cents(),
            });
        }

        let totals = compute_totals(&amounts, context.discount, context.tax_rate)?;
        if totals.discount_clamped {
            warn!(
                requested = context.discount.value,
                applied = totals.discount.cents(),
                "Discount exceeds subtotal, clamped"
            );
        }

        let now = Utc::now();
        let (amount_received, change, paid_at, paid_by) = match context.status {
            InvoiceStatus::Paid => {
                let received = amount_received.unwrap_or(totals.grand_total);
                (
                    Some(received),
                    totals.change_for(received),
                    Some(now),
                    Some(cashier_id.clone()),
                )
            }
            InvoiceStatus::Unpaid => (amount_received, Money::zero(), None, None),
        };

        let draft = Invoice {
            id: String::new(),
            invoice_number: String::new(),
            number_prefix: self.config.numbering.prefix.clone(),
            sequence: None,
            lines,
            discount: context.discount,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_rate_bps: totals.tax_rate.bps(),
            tax_cents: totals.tax.cents(),
            grand_total_cents: totals.grand_total.cents(),
            amount_received_cents: amount_received.map(|m| m.cents()),
            change_cents: change.cents(),
            status: context.status,
            customer_ref: context
                .customer_ref
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            cashier_id,
            created_at: now,
            paid_at,
            paid_by,
        };

        let invoice = self.append_numbered(draft).await?;
        info!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            grand_total = %invoice.grand_total(),
            status = %invoice.status,
            "Invoice committed"
        );

        self.decrement_stock(&invoice).await;
        Ok(invoice)
    }

    async fn load_product(&self, product_id: &str) -> EngineResult<Product> {
        match self.catalog.get(product_id).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) | Err(StoreError::NotFound { .. }) => Err(ValidationError::UnknownProduct {
                product_id: product_id.to_string(),
            }
            .into()),
            Err(err) => Err(EngineError::StoreUnavailable(err.to_string())),
        }
    }

    fn check_discount_limit(&self, product: &Product, unit_amount: Money) -> EngineResult<()> {
        if !self.config.sales.enforce_discount_limit {
            return Ok(());
        }

        match product.min_unit_amount() {
            Some(min) if unit_amount < min => Err(ValidationError::DiscountLimitExceeded {
                product_id: product.id.clone(),
                unit_amount_cents: unit_amount.cents(),
                min_cents: min.cents(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Allocates a number and appends, retrying when another writer took it.
    async fn append_numbered(&self, draft: Invoice) -> EngineResult<Invoice> {
        let _guard = self.commit_lock.lock().await;
        let max_attempts = self.config.numbering.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let allocated = self.next_number().await?;

            let mut invoice = draft.clone();
            invoice.invoice_number = allocated.invoice_number;
            invoice.sequence = allocated.sequence;

            match self.store.append(invoice).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict { invoice_number }) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        invoice_number = %invoice_number,
                        "Invoice number taken, re-reading highest number"
                    );
                }
                Err(StoreError::Conflict { invoice_number }) => {
                    error!(
                        attempts = attempt,
                        invoice_number = %invoice_number,
                        "Invoice number conflicts exhausted retries"
                    );
                    return Err(EngineError::StoreUnavailable(format!(
                        "invoice number still taken after {} attempts (last tried '{}')",
                        attempt, invoice_number
                    )));
                }
                Err(err) => {
                    error!(error = %err, "Failed to append invoice");
                    return Err(EngineError::StoreUnavailable(err.to_string()));
                }
            }
        }
    }

    async fn decrement_stock(&self, invoice: &Invoice) {
        for line in &invoice.lines {
            match self
                .catalog
                .decrement_stock(&line.product_id, line.quantity)
                .await
            {
                Ok(remaining) => debug!(
                    product_id = %line.product_id,
                    sold = line.quantity,
                    remaining,
                    "Stock decremented"
                ),
                Err(err) => warn!(
                    invoice_number = %invoice.invoice_number,
                    product_id = %line.product_id,
                    sold = line.quantity,
                    error = %err,
                    "Stock decrement failed, invoice kept"
                ),
            }
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves an invoice to `new_status`.
    ///
    /// ## Idempotence
    /// When the invoice is already in `new_status` nothing is written and
    /// the stored record is returned, so the first payer's `paid_at` and
    /// `paid_by` survive repeated calls.
    pub async fn toggle_status(
        &self,
        invoice_id: &str,
        new_status: InvoiceStatus,
        actor: &str,
    ) -> EngineResult<Invoice> {
        let actor = validate_actor("actor", actor)?;
        let invoice = self.get_invoice(invoice_id).await?;

        if invoice.status == new_status {
            debug!(
                invoice_number = %invoice.invoice_number,
                status = %new_status,
                "Status unchanged"
            );
            return Ok(invoice);
        }

        let change = match new_status {
            InvoiceStatus::Paid => StatusChange {
                status: InvoiceStatus::Paid,
                paid_at: Some(Utc::now()),
                paid_by: Some(actor.clone()),
            },
            InvoiceStatus::Unpaid => StatusChange {
                status: InvoiceStatus::Unpaid,
                paid_at: None,
                paid_by: None,
            },
        };

        let expected_paid_at = change.paid_at;
        let updated = self.store.update(invoice_id, change).await?;
        if updated.paid_at != expected_paid_at {
            // Another terminal set this status first; its audit fields stand.
            debug!(
                invoice_number = %updated.invoice_number,
                status = %updated.status,
                "Status already changed by another writer"
            );
            return Ok(updated);
        }
        info!(
            invoice_number = %updated.invoice_number,
            from = %invoice.status,
            to = %updated.status,
            actor = %actor,
            "Invoice status changed"
        );
        Ok(updated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_invoice(&self, invoice_id: &str) -> EngineResult<Invoice> {
        self.store
            .get(invoice_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Invoice", invoice_id))
    }

    /// Aggregates every stored invoice matching `filter`.
    pub async fn sales_summary(&self, filter: &SummaryFilter) -> EngineResult<SalesSummary> {
        sales_summary(&self.store, filter).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCatalog, MemoryInvoiceStore};
    use async_trait::async_trait;
    use futures_util::stream::BoxStream;
    use galaxy_core::StatusChange;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::store::StoreResult;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::with_products([
            Product::new("widget", "Widget", Money::from_cents(1000), 10).with_sku("WID-1"),
            Product::new("gadget", "Gadget", Money::from_cents(1500), 3)
                .with_buying_price(Money::from_cents(900))
                .with_discount_limit_bps(1000),
            Product::new("bolt", "Bolt", Money::from_cents(500), 1),
        ])
    }

    fn engine() -> InvoiceEngine<MemoryCatalog, MemoryInvoiceStore> {
        InvoiceEngine::new(catalog(), MemoryInvoiceStore::new(), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_widget_invoice_totals() {
        let engine = engine();
        let cart = [CartLine::with_unit_amount("widget", 2, Money::from_cents(1000))];
        let ctx = CommitContext::new("ali").tax_rate(TaxRate::from_percent(5));

        let invoice = engine.commit_invoice(&cart, ctx).await.unwrap();

        assert_eq!(invoice.subtotal().to_string(), "20.00");
        assert_eq!(invoice.discount_amount().to_string(), "0.00");
        assert_eq!(invoice.tax().to_string(), "1.00");
        assert_eq!(invoice.grand_total().to_string(), "21.00");
        assert_eq!(invoice.invoice_number, "glxy0001");
        assert!(invoice.is_sequential());
        assert!(!invoice.id.is_empty());
    }

    #[tokio::test]
    async fn test_percentage_discount_over_two_lines() {
        let engine = engine();
        let cart = [
            CartLine::with_unit_amount("gadget", 3, Money::from_cents(1500)),
            CartLine::with_unit_amount("bolt", 1, Money::from_cents(500)),
        ];
        let ctx = CommitContext::new("ali").discount(Discount::percent(10));

        let invoice = engine.commit_invoice(&cart, ctx).await.unwrap();

        assert_eq!(invoice.subtotal().to_string(), "50.00");
        assert_eq!(invoice.discount_amount().to_string(), "5.00");
        assert_eq!(invoice.grand_total().to_string(), "45.00");
        assert_eq!(invoice.lines[0].line_no, 1);
        assert_eq!(invoice.lines[1].line_no, 2);
        assert_eq!(invoice.lines[1].name_snapshot, "Bolt");
    }

    #[tokio::test]
    async fn test_sequential_numbers() {
        let engine = engine();
        let cart = [CartLine::new("widget", 1)];

        let first = engine.commit_invoice(&cart, CommitContext::new("ali")).await.unwrap();
        let second = engine.commit_invoice(&cart, CommitContext::new("ali")).await.unwrap();

        assert_eq!(first.invoice_number, "glxy0001");
        assert_eq!(second.invoice_number, "glxy0002");
        assert_eq!(engine.allocate_invoice_number().await.unwrap().invoice_number, "glxy0003");
    }

    #[tokio::test]
    async fn test_custom_prefix_and_width() {
        let mut config = EngineConfig::default().with_prefix("pfx");
        config.numbering.min_width = 6;
        let engine = InvoiceEngine::new(catalog(), MemoryInvoiceStore::new(), config);

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();
        assert_eq!(invoice.invoice_number, "pfx000001");
        assert_eq!(invoice.number_prefix, "pfx");
    }

    #[tokio::test]
    async fn test_unit_amount_defaults_to_product_price() {
        let engine = engine();
        let invoice = engine
            .commit_invoice(&[CartLine::new("gadget", 2)], CommitContext::new("ali"))
            .await
            .unwrap();

        assert_eq!(invoice.lines[0].unit_amount_cents, 1500);
        assert_eq!(invoice.lines[0].buying_price_cents, 900);
        assert_eq!(invoice.subtotal_cents, 3000);
    }

    #[tokio::test]
    async fn test_oversell_clamps_stock_and_succeeds() {
        let engine = engine();
        let invoice = engine
            .commit_invoice(&[CartLine::new("gadget", 5)], CommitContext::new("ali"))
            .await
            .unwrap();

        assert_eq!(invoice.lines[0].quantity, 5);
        assert_eq!(engine.catalog().quantity_of("gadget").await, Some(0));
    }

    #[tokio::test]
    async fn test_repeated_product_lines_each_decrement() {
        let engine = engine();
        let cart = [CartLine::new("widget", 2), CartLine::new("widget", 3)];
        engine.commit_invoice(&cart, CommitContext::new("ali")).await.unwrap();

        assert_eq!(engine.catalog().quantity_of("widget").await, Some(5));
    }

    #[tokio::test]
    async fn test_empty_cart_has_no_side_effects() {
        let engine = engine();
        let err = engine.commit_invoice(&[], CommitContext::new("ali")).await.unwrap_err();

        assert_eq!(err, EngineError::Validation(ValidationError::EmptyCart));
        assert!(engine.store().is_empty().await);
        assert_eq!(engine.catalog().quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_unknown_product_has_no_side_effects() {
        let engine = engine();
        let cart = [CartLine::new("widget", 1), CartLine::new("ghost", 1)];
        let err = engine.commit_invoice(&cart, CommitContext::new("ali")).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnknownProduct { ref product_id }) if product_id == "ghost"
        ));
        assert!(engine.store().is_empty().await);
        assert_eq!(engine.catalog().quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_invalid_lines_and_context_are_rejected() {
        let engine = engine();

        let bad_qty = engine
            .commit_invoice(&[CartLine::new("widget", 0)], CommitContext::new("ali"))
            .await;
        assert!(matches!(bad_qty, Err(EngineError::Validation(_))));

        let bad_amount = engine
            .commit_invoice(
                &[CartLine::with_unit_amount("widget", 1, Money::from_cents(-1))],
                CommitContext::new("ali"),
            )
            .await;
        assert!(matches!(bad_amount, Err(EngineError::Validation(_))));

        let bad_cashier = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("  "))
            .await;
        assert!(matches!(bad_cashier, Err(EngineError::Validation(_))));

        let bad_discount = engine
            .commit_invoice(
                &[CartLine::new("widget", 1)],
                CommitContext::new("ali").discount(Discount::percentage_bps(12_000)),
            )
            .await;
        assert!(matches!(bad_discount, Err(EngineError::Validation(_))));

        assert!(engine.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_over_discount_is_clamped_at_commit() {
        let engine = engine();
        let ctx = CommitContext::new("ali")
            .discount(Discount::amount(Money::from_cents(99_999)))
            .tax_rate(TaxRate::from_percent(5));

        let invoice = engine.commit_invoice(&[CartLine::new("widget", 1)], ctx).await.unwrap();

        assert_eq!(invoice.discount_cents, 1000);
        assert_eq!(invoice.grand_total_cents, 0);
    }

    #[tokio::test]
    async fn test_paid_commit_records_payment() {
        let engine = engine();
        let ctx = CommitContext::new("ali").paid(Some(Money::from_cents(5000)));
        let invoice = engine
            .commit_invoice(&[CartLine::new("gadget", 3)], ctx)
            .await
            .unwrap();

        assert!(invoice.is_paid());
        assert_eq!(invoice.amount_received_cents, Some(5000));
        assert_eq!(invoice.change().cents(), 500);
        assert_eq!(invoice.paid_by.as_deref(), Some("ali"));
        assert!(invoice.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_paid_commit_defaults_received_to_grand_total() {
        let engine = engine();
        let ctx = CommitContext::new("ali").paid(None);
        let invoice = engine.commit_invoice(&[CartLine::new("bolt", 1)], ctx).await.unwrap();

        assert_eq!(invoice.amount_received_cents, Some(500));
        assert_eq!(invoice.change_cents, 0);
    }

    #[tokio::test]
    async fn test_unpaid_commit_has_no_change() {
        let engine = engine();
        let mut ctx = CommitContext::new("ali");
        ctx.amount_received_cents = Some(10_000);
        let invoice = engine.commit_invoice(&[CartLine::new("bolt", 1)], ctx).await.unwrap();

        assert_eq!(invoice.change_cents, 0);
        assert!(invoice.paid_at.is_none());
        assert!(invoice.paid_by.is_none());
    }

    #[tokio::test]
    async fn test_discount_limit_enforcement() {
        let mut config = EngineConfig::default();
        config.sales.enforce_discount_limit = true;
        let engine = InvoiceEngine::new(catalog(), MemoryInvoiceStore::new(), config);

        // gadget: 15.00 with a 10% limit → at least 13.50
        let ok = engine
            .commit_invoice(
                &[CartLine::with_unit_amount("gadget", 1, Money::from_cents(1350))],
                CommitContext::new("ali"),
            )
            .await;
        assert!(ok.is_ok());

        let err = engine
            .commit_invoice(
                &[CartLine::with_unit_amount("gadget", 1, Money::from_cents(1349))],
                CommitContext::new("ali"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DiscountLimitExceeded { min_cents: 1350, .. })
        ));
    }

    #[tokio::test]
    async fn test_discount_limit_off_by_default() {
        let engine = engine();
        let result = engine
            .commit_invoice(
                &[CartLine::with_unit_amount("gadget", 1, Money::from_cents(1))],
                CommitContext::new("ali"),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_toggle_status_round_trip() {
        let engine = engine();
        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();

        let paid = engine
            .toggle_status(&invoice.id, InvoiceStatus::Paid, "sara")
            .await
            .unwrap();
        assert!(paid.is_paid());
        assert_eq!(paid.paid_by.as_deref(), Some("sara"));
        assert!(paid.paid_at.is_some());

        let unpaid = engine
            .toggle_status(&invoice.id, InvoiceStatus::Unpaid, "sara")
            .await
            .unwrap();
        assert_eq!(unpaid.status, InvoiceStatus::Unpaid);
        assert!(unpaid.paid_at.is_none());
        assert!(unpaid.paid_by.is_none());

        // Financial fields never move
        assert_eq!(unpaid.grand_total_cents, invoice.grand_total_cents);
        assert_eq!(unpaid.lines, invoice.lines);
        assert_eq!(unpaid.invoice_number, invoice.invoice_number);
    }

    #[tokio::test]
    async fn test_toggle_status_is_idempotent() {
        let engine = engine();
        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();

        let first = engine
            .toggle_status(&invoice.id, InvoiceStatus::Paid, "sara")
            .await
            .unwrap();
        let second = engine
            .toggle_status(&invoice.id, InvoiceStatus::Paid, "omar")
            .await
            .unwrap();

        assert_eq!(second.paid_by.as_deref(), Some("sara"));
        assert_eq!(second.paid_at, first.paid_at);
    }

    #[tokio::test]
    async fn test_toggle_status_errors() {
        let engine = engine();
        let missing = engine
            .toggle_status("no-such-id", InvoiceStatus::Paid, "sara")
            .await;
        assert!(matches!(missing, Err(EngineError::NotFound { .. })));

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();
        let no_actor = engine.toggle_status(&invoice.id, InvoiceStatus::Paid, "").await;
        assert!(matches!(no_actor, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_invoice() {
        let engine = engine();
        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();

        assert_eq!(engine.get_invoice(&invoice.id).await.unwrap(), invoice);
        assert!(matches!(
            engine.get_invoice("nope").await,
            Err(EngineError::NotFound { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Failure injection
    // -------------------------------------------------------------------------

    /// Wraps a memory store with switchable failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryInvoiceStore,
        fail_reads: bool,
        fail_appends: bool,
        conflicts_left: AtomicU32,
        highest_override: Option<String>,
        appends: AtomicU32,
    }

    #[async_trait]
    impl InvoiceStore for FlakyStore {
        async fn append(&self, invoice: Invoice) -> StoreResult<Invoice> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            if self.fail_appends {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict {
                    invoice_number: invoice.invoice_number,
                });
            }
            self.inner.append(invoice).await
        }

        async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>> {
            if self.fail_reads {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            if let Some(ref number) = self.highest_override {
                return Ok(Some(number.clone()));
            }
            self.inner.highest_number(prefix).await
        }

        async fn get(&self, id: &str) -> StoreResult<Option<Invoice>> {
            self.inner.get(id).await
        }

        async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice> {
            self.inner.update(id, change).await
        }

        fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>> {
            self.inner.list_all()
        }
    }

    fn flaky_engine(store: FlakyStore, config: EngineConfig) -> InvoiceEngine<MemoryCatalog, Arc<FlakyStore>> {
        InvoiceEngine::new(catalog(), Arc::new(store), config)
    }

    #[tokio::test]
    async fn test_unreadable_store_is_unavailable() {
        let engine = flaky_engine(
            FlakyStore {
                fail_reads: true,
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let err = engine
            .commit_invoice(&[CartLine::new("widget", 2)], CommitContext::new("ali"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert_eq!(engine.store().appends.load(Ordering::SeqCst), 0);
        assert_eq!(engine.catalog().quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_degraded_numbering_is_flagged() {
        let mut config = EngineConfig::default();
        config.numbering.allow_degraded = true;
        let engine = flaky_engine(
            FlakyStore {
                fail_reads: true,
                ..Default::default()
            },
            config,
        );

        let allocated = engine.allocate_invoice_number().await.unwrap();
        assert!(allocated.is_degraded());

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();
        assert!(!invoice.is_sequential());
        assert!(invoice.invoice_number.starts_with("glxy-T"));
        assert!(galaxy_core::numbering::is_degraded(&invoice.invoice_number, "glxy"));
    }

    #[tokio::test]
    async fn test_append_failure_has_no_side_effects() {
        let engine = flaky_engine(
            FlakyStore {
                fail_appends: true,
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let err = engine
            .commit_invoice(&[CartLine::new("widget", 2)], CommitContext::new("ali"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        // Generic failures are not retried
        assert_eq!(engine.store().appends.load(Ordering::SeqCst), 1);
        assert_eq!(engine.catalog().quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let engine = flaky_engine(
            FlakyStore {
                conflicts_left: AtomicU32::new(2),
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();
        assert_eq!(invoice.invoice_number, "glxy0001");
        assert_eq!(engine.store().appends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_conflict_retries_are_bounded() {
        let engine = flaky_engine(
            FlakyStore {
                conflicts_left: AtomicU32::new(10),
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let err = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert_eq!(engine.store().appends.load(Ordering::SeqCst), 3);
        assert!(engine.store().inner.is_empty().await);
        assert_eq!(engine.catalog().quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_malformed_highest_number_is_unavailable() {
        let engine = flaky_engine(
            FlakyStore {
                highest_override: Some("garbage".to_string()),
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let err = engine.allocate_invoice_number().await.unwrap_err();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_width_grows_after_9999() {
        let engine = flaky_engine(
            FlakyStore {
                highest_override: Some("glxy9999".to_string()),
                ..Default::default()
            },
            EngineConfig::default(),
        );

        let allocated = engine.allocate_invoice_number().await.unwrap();
        assert_eq!(allocated.invoice_number, "glxy10000");
        assert_eq!(allocated.sequence, Some(10_000));
    }

    /// Catalog whose stock writes always fail.
    struct ReadOnlyCatalog(MemoryCatalog);

    #[async_trait]
    impl ProductCatalog for ReadOnlyCatalog {
        async fn get(&self, product_id: &str) -> StoreResult<Option<Product>> {
            self.0.get(product_id).await
        }

        async fn decrement_stock(&self, _product_id: &str, _by: i64) -> StoreResult<i64> {
            Err(StoreError::Unavailable("catalog is read-only".to_string()))
        }

        async fn find_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
            self.0.find_by_sku(sku).await
        }
    }

    #[tokio::test]
    async fn test_stock_failure_keeps_invoice() {
        let engine = InvoiceEngine::new(
            ReadOnlyCatalog(catalog()),
            MemoryInvoiceStore::new(),
            EngineConfig::default(),
        );

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 2)], CommitContext::new("ali"))
            .await
            .unwrap();

        assert_eq!(engine.get_invoice(&invoice.id).await.unwrap(), invoice);
        assert_eq!(engine.catalog().0.quantity_of("widget").await, Some(10));
    }

    #[tokio::test]
    async fn test_context_uses_default_tax_rate() {
        let mut config = EngineConfig::default();
        config.sales.default_tax_rate_bps = 500;
        let engine = InvoiceEngine::new(catalog(), MemoryInvoiceStore::new(), config);

        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 2)], engine.context_for("ali"))
            .await
            .unwrap();

        assert_eq!(invoice.tax_rate_bps, 500);
        assert_eq!(invoice.tax_cents, invoice.subtotal_cents / 20);
    }

    /// Serves stale reads: `get` reports every invoice as unpaid, as if
    /// another terminal paid it between this engine's read and write.
    struct StaleReadStore(MemoryInvoiceStore);

    #[async_trait]
    impl InvoiceStore for StaleReadStore {
        async fn append(&self, invoice: Invoice) -> StoreResult<Invoice> {
            self.0.append(invoice).await
        }

        async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>> {
            self.0.highest_number(prefix).await
        }

        async fn get(&self, id: &str) -> StoreResult<Option<Invoice>> {
            Ok(self.0.get(id).await?.map(|mut inv| {
                StatusChange {
                    status: InvoiceStatus::Unpaid,
                    paid_at: None,
                    paid_by: None,
                }
                .apply_to(&mut inv);
                inv
            }))
        }

        async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice> {
            self.0.update(id, change).await
        }

        fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>> {
            self.0.list_all()
        }
    }

    #[tokio::test]
    async fn test_concurrent_payer_keeps_first_audit_fields() {
        let engine = InvoiceEngine::new(
            catalog(),
            StaleReadStore(MemoryInvoiceStore::new()),
            EngineConfig::default(),
        );
        let invoice = engine
            .commit_invoice(&[CartLine::new("widget", 1)], CommitContext::new("ali"))
            .await
            .unwrap();

        let first = engine
            .toggle_status(&invoice.id, InvoiceStatus::Paid, "ana")
            .await
            .unwrap();
        let second = engine
            .toggle_status(&invoice.id, InvoiceStatus::Paid, "ben")
            .await
            .unwrap();

        assert_eq!(second.paid_by.as_deref(), Some("ana"));
        assert_eq!(second.paid_at, first.paid_at);
    }
}
