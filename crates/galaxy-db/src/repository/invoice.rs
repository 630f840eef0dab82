//! # Invoice Repository
//!
//! SQLite-backed [`InvoiceStore`].
//!
//! ## Append
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Append Transaction                                │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    INSERT INTO invoices (...)        ← UNIQUE(invoice_number)          │
//! │    INSERT INTO invoice_lines (...)   × n                               │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  UNIQUE violation → StoreError::Conflict (engine re-allocates)         │
//! │  any other error  → rollback, StoreError::Unavailable                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Listing
//! `list_all` pages through invoices by `rowid` (insertion order) and loads
//! the lines of each page with one extra query. Dropping the stream stops
//! paging; calling `list_all` again starts from the beginning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use galaxy_core::{
    Discount, DiscountKind, Invoice, InvoiceLine, InvoiceStatus, StatusChange,
};
use galaxy_engine::{InvoiceStore, StoreResult};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Invoices fetched per page by `list_all`.
const PAGE_SIZE: i64 = 100;

const INVOICE_COLUMNS: &str = r#"
    id,
    invoice_number,
    number_prefix,
    sequence,
    discount_kind,
    discount_value,
    subtotal_cents,
    discount_cents,
    tax_rate_bps,
    tax_cents,
    grand_total_cents,
    amount_received_cents,
    change_cents,
    status,
    customer_ref,
    cashier_id,
    created_at,
    paid_at,
    paid_by
"#;

// =============================================================================
// Row Types
// =============================================================================

/// Header row of the `invoices` table.
#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    number_prefix: String,
    sequence: Option<i64>,
    discount_kind: DiscountKind,
    discount_value: i64,
    subtotal_cents: i64,
    discount_cents: i64,
    tax_rate_bps: u32,
    tax_cents: i64,
    grand_total_cents: i64,
    amount_received_cents: Option<i64>,
    change_cents: i64,
    status: InvoiceStatus,
    customer_ref: Option<String>,
    cashier_id: String,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    paid_by: Option<String>,
}

impl InvoiceRow {
    fn into_invoice(self, lines: Vec<InvoiceLine>) -> Invoice {
        Invoice {
            id: self.id,
            invoice_number: self.invoice_number,
            number_prefix: self.number_prefix,
            sequence: self.sequence,
            lines,
            discount: Discount {
                kind: self.discount_kind,
                value: self.discount_value,
            },
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_rate_bps: self.tax_rate_bps,
            tax_cents: self.tax_cents,
            grand_total_cents: self.grand_total_cents,
            amount_received_cents: self.amount_received_cents,
            change_cents: self.change_cents,
            status: self.status,
            customer_ref: self.customer_ref,
            cashier_id: self.cashier_id,
            created_at: self.created_at,
            paid_at: self.paid_at,
            paid_by: self.paid_by,
        }
    }
}

/// Header row plus its position, for keyset paging.
#[derive(Debug, FromRow)]
struct PagedInvoiceRow {
    rowid: i64,
    #[sqlx(flatten)]
    row: InvoiceRow,
}

#[derive(Debug, FromRow)]
struct LineRow {
    invoice_id: String,
    line_no: u32,
    product_id: String,
    name_snapshot: String,
    sku_snapshot: Option<String>,
    quantity: i64,
    unit_amount_cents: i64,
    buying_price_cents: i64,
    line_total_cents: i64,
}

impl From<LineRow> for InvoiceLine {
    fn from(row: LineRow) -> Self {
        InvoiceLine {
            line_no: row.line_no,
            product_id: row.product_id,
            name_snapshot: row.name_snapshot,
            sku_snapshot: row.sku_snapshot,
            quantity: row.quantity,
            unit_amount_cents: row.unit_amount_cents,
            buying_price_cents: row.buying_price_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Inserts an invoice and its lines in one transaction.
    ///
    /// An empty `id` is replaced with a fresh UUID.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - invoice number already used
    pub async fn insert(&self, invoice: &Invoice) -> DbResult<Invoice> {
        let mut invoice = invoice.clone();
        if invoice.id.is_empty() {
            invoice.id = Uuid::new_v4().to_string();
        }

        debug!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            lines = invoice.lines.len(),
            "Inserting invoice"
        );

        let number = invoice.invoice_number.clone();
        self.insert_tx(&invoice)
            .await
            .map_err(|e| e.with_value(number))?;

        Ok(invoice)
    }

    async fn insert_tx(&self, invoice: &Invoice) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, number_prefix, sequence,
                discount_kind, discount_value,
                subtotal_cents, discount_cents, tax_rate_bps, tax_cents,
                grand_total_cents, amount_received_cents, change_cents,
                status, customer_ref, cashier_id,
                created_at, paid_at, paid_by
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13,
                ?14, ?15, ?16,
                ?17, ?18, ?19
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.number_prefix)
        .bind(invoice.sequence)
        .bind(invoice.discount.kind)
        .bind(invoice.discount.value)
        .bind(invoice.subtotal_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.tax_rate_bps)
        .bind(invoice.tax_cents)
        .bind(invoice.grand_total_cents)
        .bind(invoice.amount_received_cents)
        .bind(invoice.change_cents)
        .bind(invoice.status)
        .bind(&invoice.customer_ref)
        .bind(&invoice.cashier_id)
        .bind(invoice.created_at)
        .bind(invoice.paid_at)
        .bind(&invoice.paid_by)
        .execute(&mut *tx)
        .await?;

        for line in &invoice.lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (
                    invoice_id, line_no, product_id, name_snapshot, sku_snapshot,
                    quantity, unit_amount_cents, buying_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&invoice.id)
            .bind(line.line_no)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(&line.sku_snapshot)
            .bind(line.quantity)
            .bind(line.unit_amount_cents)
            .bind(line.buying_price_cents)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Gets an invoice with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let Some(row) = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let lines = self.lines_of(id).await?;
        Ok(Some(row.into_invoice(lines)))
    }

    /// Gets an invoice by its number.
    pub async fn get_by_number(&self, invoice_number: &str) -> DbResult<Option<Invoice>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM invoices WHERE invoice_number = ?1")
                .bind(invoice_number)
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn lines_of(&self, invoice_id: &str) -> DbResult<Vec<InvoiceLine>> {
        let rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT
                invoice_id, line_no, product_id, name_snapshot, sku_snapshot,
                quantity, unit_amount_cents, buying_price_cents, line_total_cents
            FROM invoice_lines
            WHERE invoice_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceLine::from).collect())
    }

    /// Highest sequential number under `prefix`, by sequence value.
    ///
    /// Degraded numbers carry no sequence and are skipped.
    pub async fn highest_sequential(&self, prefix: &str) -> DbResult<Option<String>> {
        let number: Option<String> = sqlx::query_scalar(
            r#"
            SELECT invoice_number
            FROM invoices
            WHERE number_prefix = ?1 AND sequence IS NOT NULL
            ORDER BY sequence DESC
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(&self.pool)
        .await?;

        Ok(number)
    }

    /// Replaces the status fields of an invoice whose status differs from
    /// `change.status`. An invoice already in that status is returned as
    /// stored.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - no invoice with this id
    pub async fn set_status(&self, id: &str, change: &StatusChange) -> DbResult<Invoice> {
        debug!(id = %id, status = %change.status, "Updating invoice status");

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = ?2, paid_at = ?3, paid_by = ?4
            WHERE id = ?1 AND status != ?2
            "#,
        )
        .bind(id)
        .bind(change.status)
        .bind(change.paid_at)
        .bind(&change.paid_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(id = %id, "Status unchanged");
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    /// One page of invoices after `after_rowid`, lines included.
    ///
    /// Returns the rowid of the last invoice on the page for the next call.
    pub async fn page_after(
        &self,
        after_rowid: i64,
        limit: i64,
    ) -> DbResult<(Vec<Invoice>, Option<i64>)> {
        let sql = format!(
            "SELECT rowid, {INVOICE_COLUMNS} FROM invoices WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, PagedInvoiceRow>(&sql)
            .bind(after_rowid)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let last_rowid = rows.last().map(|r| r.rowid);
        let Some(last) = last_rowid else {
            return Ok((Vec::new(), None));
        };

        let line_rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT
                l.invoice_id, l.line_no, l.product_id, l.name_snapshot, l.sku_snapshot,
                l.quantity, l.unit_amount_cents, l.buying_price_cents, l.line_total_cents
            FROM invoice_lines l
            INNER JOIN invoices i ON i.id = l.invoice_id
            WHERE i.rowid > ?1 AND i.rowid <= ?2
            ORDER BY l.invoice_id, l.line_no
            "#,
        )
        .bind(after_rowid)
        .bind(last)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<String, Vec<InvoiceLine>> = HashMap::new();
        for line in line_rows {
            lines
                .entry(line.invoice_id.clone())
                .or_default()
                .push(InvoiceLine::from(line));
        }

        let invoices = rows
            .into_iter()
            .map(|paged| {
                let own = lines.remove(&paged.row.id).unwrap_or_default();
                paged.row.into_invoice(own)
            })
            .collect();

        Ok((invoices, last_rowid))
    }

    /// Counts stored invoices (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl InvoiceStore for InvoiceRepository {
    async fn append(&self, invoice: Invoice) -> StoreResult<Invoice> {
        Ok(self.insert(&invoice).await?)
    }

    async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self.highest_sequential(prefix).await?)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Invoice>> {
        Ok(self.get_by_id(id).await?)
    }

    async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice> {
        Ok(self.set_status(id, &change).await?)
    }

    fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>> {
        stream::unfold(Some(0i64), move |cursor| async move {
            let after = cursor?;
            match self.page_after(after, PAGE_SIZE).await {
                Ok((page, _)) if page.is_empty() => None,
                Ok((page, last)) => {
                    let next = if (page.len() as i64) < PAGE_SIZE {
                        None
                    } else {
                        last
                    };
                    let items: Vec<StoreResult<Invoice>> = page.into_iter().map(Ok).collect();
                    Some((stream::iter(items), next))
                }
                Err(e) => Some((stream::iter(vec![Err(e.into())]), None)),
            }
        })
        .flatten()
        .boxed()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use futures_util::TryStreamExt;
    use galaxy_core::{CartLine, CommitContext, Money, Product, TaxRate};
    use galaxy_engine::{
        EngineConfig, EngineError, InvoiceEngine, StoreError, SummaryFilter,
    };

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn invoice(number: &str, sequence: Option<i64>) -> Invoice {
        Invoice {
            id: String::new(),
            invoice_number: number.to_string(),
            number_prefix: "glxy".to_string(),
            sequence,
            lines: vec![InvoiceLine {
                line_no: 1,
                product_id: "p-1".to_string(),
                name_snapshot: "Widget".to_string(),
                sku_snapshot: Some("WID-1".to_string()),
                quantity: 2,
                unit_amount_cents: 1000,
                buying_price_cents: 600,
                line_total_cents: 2000,
            }],
            discount: Discount::none(),
            subtotal_cents: 2000,
            discount_cents: 0,
            tax_rate_bps: 0,
            tax_cents: 0,
            grand_total_cents: 2000,
            amount_received_cents: None,
            change_cents: 0,
            status: InvoiceStatus::Unpaid,
            customer_ref: None,
            cashier_id: "alice".to_string(),
            created_at: Utc::now(),
            paid_at: None,
            paid_by: None,
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let repo = db().await.invoices();
        let stored = repo.append(invoice("glxy0001", Some(1))).await.unwrap();
        assert!(!stored.id.is_empty());

        let loaded = repo.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.invoice_number, "glxy0001");
        assert_eq!(loaded.lines.len(), 1);
        assert_eq!(loaded.lines[0].sku_snapshot.as_deref(), Some("WID-1"));
        assert_eq!(loaded.grand_total_cents, 2000);
        assert_eq!(loaded.status, InvoiceStatus::Unpaid);

        let by_number = repo.get_by_number("glxy0001").await.unwrap().unwrap();
        assert_eq!(by_number.id, stored.id);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_number_is_conflict() {
        let repo = db().await.invoices();
        repo.append(invoice("glxy0001", Some(1))).await.unwrap();

        let err = repo.append(invoice("glxy0001", Some(1))).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                invoice_number: "glxy0001".to_string()
            }
        );
        // Rolled back: no orphan lines, one invoice.
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_highest_number_orders_by_sequence() {
        let repo = db().await.invoices();
        repo.append(invoice("glxy0009", Some(9))).await.unwrap();
        repo.append(invoice("glxy0010", Some(10))).await.unwrap();
        repo.append(invoice("glxy-T20260101120000000", None))
            .await
            .unwrap();

        assert_eq!(
            repo.highest_number("glxy").await.unwrap().as_deref(),
            Some("glxy0010")
        );
        assert_eq!(repo.highest_number("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = db().await.invoices();
        let stored = repo.append(invoice("glxy0001", Some(1))).await.unwrap();

        let paid = repo
            .update(
                &stored.id,
                StatusChange {
                    status: InvoiceStatus::Paid,
                    paid_at: Some(Utc::now()),
                    paid_by: Some("bob".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(paid.is_paid());
        assert_eq!(paid.paid_by.as_deref(), Some("bob"));
        assert_eq!(paid.lines.len(), 1);

        let err = repo
            .update(
                "missing",
                StatusChange {
                    status: InvoiceStatus::Unpaid,
                    paid_at: None,
                    paid_by: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_second_payer_does_not_overwrite() {
        let repo = db().await.invoices();
        let stored = repo.append(invoice("glxy0001", Some(1))).await.unwrap();

        let paid_by = |who: &str| StatusChange {
            status: InvoiceStatus::Paid,
            paid_at: Some(Utc::now()),
            paid_by: Some(who.to_string()),
        };
        let first = repo.update(&stored.id, paid_by("ana")).await.unwrap();
        let second = repo.update(&stored.id, paid_by("ben")).await.unwrap();

        assert_eq!(second.paid_by.as_deref(), Some("ana"));
        assert_eq!(second.paid_at, first.paid_at);

        let unpaid = repo
            .update(
                &stored.id,
                StatusChange {
                    status: InvoiceStatus::Unpaid,
                    paid_at: None,
                    paid_by: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(unpaid.status, InvoiceStatus::Unpaid);
        assert_eq!(unpaid.paid_by, None);
    }

    #[tokio::test]
    async fn test_list_all_pages_in_creation_order() {
        let repo = db().await.invoices();
        let total = PAGE_SIZE as usize + 5;
        for seq in 1..=total {
            repo.append(invoice(&format!("glxy{seq:04}"), Some(seq as i64)))
                .await
                .unwrap();
        }

        let all: Vec<Invoice> = repo.list_all().try_collect().await.unwrap();
        assert_eq!(all.len(), total);
        assert_eq!(all[0].invoice_number, "glxy0001");
        assert_eq!(all[total - 1].invoice_number, format!("glxy{total:04}"));
        assert!(all.iter().all(|inv| inv.lines.len() == 1));

        // Restartable
        let first: Vec<Invoice> = repo.list_all().take(3).try_collect().await.unwrap();
        assert_eq!(first.len(), 3);
        let again: Vec<Invoice> = repo.list_all().try_collect().await.unwrap();
        assert_eq!(again.len(), total);
    }

    #[tokio::test]
    async fn test_engine_on_sqlite() {
        let db = db().await;
        db.products()
            .insert(
                &Product::new("p-1", "Widget", Money::from_cents(1000), 2)
                    .with_sku("WID-1")
                    .with_buying_price(Money::from_cents(600)),
            )
            .await
            .unwrap();

        let engine = InvoiceEngine::new(
            db.products(),
            db.invoices(),
            EngineConfig::default().with_prefix("pfx"),
        );

        let first = engine
            .commit_invoice(
                &[CartLine::new("p-1", 3)],
                CommitContext::new("alice").tax_rate(TaxRate::from_percent(10)),
            )
            .await
            .unwrap();
        assert_eq!(first.invoice_number, "pfx0001");
        assert_eq!(first.subtotal_cents, 3000);
        assert_eq!(first.tax_cents, 300);
        assert_eq!(first.grand_total_cents, 3300);

        // Oversold: stock clamps at zero.
        let widget = db.products().get_by_id("p-1").await.unwrap().unwrap();
        assert_eq!(widget.quantity, 0);

        let second = engine
            .commit_invoice(&[CartLine::new("p-1", 1)], CommitContext::new("alice"))
            .await
            .unwrap();
        assert_eq!(second.invoice_number, "pfx0002");

        let paid = engine
            .toggle_status(&first.id, InvoiceStatus::Paid, "bob")
            .await
            .unwrap();
        assert!(paid.is_paid());

        let err = engine
            .commit_invoice(&[CartLine::new("ghost", 1)], CommitContext::new("alice"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(db.invoices().count().await.unwrap(), 2);

        let err = engine
            .toggle_status("missing", InvoiceStatus::Paid, "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let summary = engine.sales_summary(&SummaryFilter::default()).await.unwrap();
        assert_eq!(summary.invoice_count, 2);
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.grand_total, Money::from_cents(3300 + 1000));
    }
}
