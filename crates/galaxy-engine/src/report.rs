//! # Sales Reporting
//!
//! Aggregates the invoice stream into totals for end-of-day screens.
//!
//! ```text
//!   InvoiceStore::list_all() ──► filter ──► fold ──► SalesSummary
//!        (lazy, restartable)
//! ```
//!
//! Degraded (timestamp) invoice numbers are collected separately so an
//! operator can see when numbering fell back.

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use galaxy_core::{Invoice, InvoiceStatus, Money};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineResult;
use crate::store::InvoiceStore;

/// Which invoices a summary covers. Empty filter means all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFilter {
    pub status: Option<InvoiceStatus>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub cashier_id: Option<String>,
}

impl SummaryFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.status.map_or(true, |s| invoice.status == s)
            && self.from.map_or(true, |from| invoice.created_at >= from)
            && self.until.map_or(true, |until| invoice.created_at < until)
            && self
                .cashier_id
                .as_deref()
                .map_or(true, |c| invoice.cashier_id == c)
    }
}

/// Totals over a set of invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub invoice_count: u64,
    pub paid_count: u64,
    pub unpaid_count: u64,
    pub units_sold: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub grand_total: Money,
    /// Grand total of paid invoices.
    pub collected: Money,
    /// Grand total of unpaid invoices.
    pub outstanding: Money,
    pub cost_of_goods: Money,
    pub gross_profit: Money,
    /// Invoice numbers issued by the degraded fallback.
    pub degraded_numbers: Vec<String>,
}

impl SalesSummary {
    fn add(&mut self, invoice: &Invoice) {
        self.invoice_count += 1;
        match invoice.status {
            InvoiceStatus::Paid => {
                self.paid_count += 1;
                self.collected += invoice.grand_total();
            }
            InvoiceStatus::Unpaid => {
                self.unpaid_count += 1;
                self.outstanding += invoice.grand_total();
            }
        }

        self.units_sold += invoice.total_quantity();
        self.subtotal += invoice.subtotal();
        self.discount += invoice.discount_amount();
        self.tax += invoice.tax();
        self.grand_total += invoice.grand_total();
        self.cost_of_goods += invoice.cost_of_goods();
        self.gross_profit += invoice.gross_profit();

        if !invoice.is_sequential() {
            self.degraded_numbers.push(invoice.invoice_number.clone());
        }
    }
}

/// Streams every invoice in `store` and sums those matching `filter`.
pub async fn sales_summary<S>(store: &S, filter: &SummaryFilter) -> EngineResult<SalesSummary>
where
    S: InvoiceStore + ?Sized,
{
    let mut summary = SalesSummary::default();
    let mut invoices = store.list_all();

    while let Some(invoice) = invoices.next().await {
        let invoice = invoice?;
        if filter.matches(&invoice) {
            summary.add(&invoice);
        }
    }

    debug!(
        invoices = summary.invoice_count,
        degraded = summary.degraded_numbers.len(),
        "Sales summary computed"
    );
    Ok(summary)
}
