//! # In-Memory Collaborators
//!
//! `ProductCatalog` and `InvoiceStore` backed by process memory.
//!
//! Used by tests and by single-node setups that persist elsewhere. The
//! invoice store enforces number uniqueness under its write lock, so
//! several engines (terminals) can share one `Arc<MemoryInvoiceStore>` and
//! still never persist the same number twice.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use galaxy_core::{Invoice, Product, StatusChange};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::ProductCatalog;
use crate::store::{InvoiceStore, StoreError, StoreResult};

// =============================================================================
// Catalog
// =============================================================================

/// Product catalog held in a map keyed by product id.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        MemoryCatalog {
            products: RwLock::new(map),
        }
    }

    /// Inserts or replaces a product.
    pub async fn insert(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    /// Current stock of a product.
    pub async fn quantity_of(&self, product_id: &str) -> Option<i64> {
        self.products.read().await.get(product_id).map(|p| p.quantity)
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn decrement_stock(&self, product_id: &str, by: i64) -> StoreResult<i64> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;

        product.quantity = product.quantity_after_sale(by.max(0));
        product.updated_at = chrono::Utc::now();
        Ok(product.quantity)
    }

    async fn find_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .products
            .read()
            .await
            .values()
            .find(|p| p.sku.as_deref() == Some(sku))
            .cloned())
    }
}

// =============================================================================
// Invoice Store
// =============================================================================

/// Invoice store held in a vector, in creation order.
#[derive(Debug, Default)]
pub struct MemoryInvoiceStore {
    invoices: RwLock<Vec<Invoice>>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.invoices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.read().await.is_empty()
    }

    /// Every stored invoice number, in creation order.
    pub async fn invoice_numbers(&self) -> Vec<String> {
        self.invoices
            .read()
            .await
            .iter()
            .map(|inv| inv.invoice_number.clone())
            .collect()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn append(&self, mut invoice: Invoice) -> StoreResult<Invoice> {
        let mut invoices = self.invoices.write().await;

        if invoices
            .iter()
            .any(|existing| existing.invoice_number == invoice.invoice_number)
        {
            return Err(StoreError::Conflict {
                invoice_number: invoice.invoice_number,
            });
        }

        if invoice.id.is_empty() {
            invoice.id = Uuid::new_v4().to_string();
        }

        debug!(id = %invoice.id, number = %invoice.invoice_number, "Appending invoice");
        invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .filter(|inv| inv.number_prefix == prefix)
            .filter_map(|inv| inv.sequence.map(|seq| (seq, &inv.invoice_number)))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, number)| number.clone()))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Invoice>> {
        Ok(self.invoices.read().await.iter().find(|inv| inv.id == id).cloned())
    }

    async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .iter_mut()
            .find(|inv| inv.id == id)
            .ok_or_else(|| StoreError::not_found("Invoice", id))?;

        if invoice.status != change.status {
            change.apply_to(invoice);
        }
        Ok(invoice.clone())
    }

    fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>> {
        // Reads one invoice per step, so the stream never holds the lock
        // between items.
        stream::unfold(0usize, move |idx| async move {
            let invoices = self.invoices.read().await;
            invoices.get(idx).cloned().map(|inv| (Ok(inv), idx + 1))
        })
        .boxed()
    }
}
