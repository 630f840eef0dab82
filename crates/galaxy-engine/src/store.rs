//! # Invoice Store
//!
//! Collaborator interface for durable invoice records.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append(invoice)          → persisted invoice (id assigned if empty)   │
//! │                             Conflict if invoice_number is taken        │
//! │  highest_number(prefix)   → highest SEQUENTIAL number, numeric order   │
//! │  get(id)                  → Option<Invoice>                            │
//! │  update(id, change)       → status fields replaced if status differs   │
//! │  list_all()               → lazy stream, creation order, restartable   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store does not restrict which fields `update` may touch beyond the
//! [`StatusChange`] shape. The engine decides when a change is allowed.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use galaxy_core::{Invoice, StatusChange};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by collaborators (catalog and store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Another invoice already holds this number.
    #[error("Invoice number '{invoice_number}' is already taken")]
    Conflict { invoice_number: String },

    /// Backend could not be reached or failed mid-operation.
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable, append-only storage of committed invoices.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Persists a new invoice. Must be durable before returning.
    async fn append(&self, invoice: Invoice) -> StoreResult<Invoice>;

    /// Highest sequential invoice number issued under `prefix`.
    async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>>;

    async fn get(&self, id: &str) -> StoreResult<Option<Invoice>>;

    /// Replaces the status fields of an existing invoice.
    ///
    /// The write only happens when the stored status differs from
    /// `change.status`, checked atomically with the write. Otherwise the
    /// stored record is returned untouched.
    async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice>;

    /// All invoices in creation order.
    fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>>;
}

#[async_trait]
impl<T: InvoiceStore + ?Sized> InvoiceStore for Arc<T> {
    async fn append(&self, invoice: Invoice) -> StoreResult<Invoice> {
        (**self).append(invoice).await
    }

    async fn highest_number(&self, prefix: &str) -> StoreResult<Option<String>> {
        (**self).highest_number(prefix).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Invoice>> {
        (**self).get(id).await
    }

    async fn update(&self, id: &str, change: StatusChange) -> StoreResult<Invoice> {
        (**self).update(id, change).await
    }

    fn list_all(&self) -> BoxStream<'_, StoreResult<Invoice>> {
        (**self).list_all()
    }
}
