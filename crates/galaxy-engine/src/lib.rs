//! # galaxy-engine: Invoice Engine for Galaxy POS
//!
//! Turns a cart into a persisted, uniquely numbered invoice and keeps the
//! catalog's stock in step with it.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         commit_invoice                                  │
//! │                                                                         │
//! │  cart + context                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate, load products ──── ProductCatalog::get                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  compute_totals (galaxy-core)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌────────── commit lock ───────────┐                                  │
//! │  │ highest_number → next → append  │ ── InvoiceStore                   │
//! │  │ retry on Conflict (bounded)     │                                   │
//! │  └─────────────────────────────────┘                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  decrement_stock per line (clamped at 0, failures logged)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Invoice                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - `InvoiceEngine` and its operations
//! - [`catalog`] - `ProductCatalog` collaborator trait
//! - [`store`] - `InvoiceStore` collaborator trait and `StoreError`
//! - [`memory`] - In-memory collaborators (single node, tests)
//! - [`config`] - `EngineConfig` (TOML + environment)
//! - [`report`] - Sales summary over the invoice stream
//! - [`error`] - `EngineError` taxonomy
//!
//! ## Usage
//! ```rust,ignore
//! use galaxy_engine::{EngineConfig, InvoiceEngine, MemoryCatalog, MemoryInvoiceStore};
//!
//! let engine = InvoiceEngine::new(catalog, store, EngineConfig::default());
//! let invoice = engine
//!     .commit_invoice(&[CartLine::new("p-1", 2)], CommitContext::new("ali"))
//!     .await?;
//! assert_eq!(invoice.invoice_number, "glxy0001");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod report;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::ProductCatalog;
pub use config::{EngineConfig, NumberingConfig, SalesConfig};
pub use engine::{AllocatedNumber, InvoiceEngine};
pub use error::{ConfigError, EngineError, EngineResult};
pub use memory::{MemoryCatalog, MemoryInvoiceStore};
pub use report::{sales_summary, SalesSummary, SummaryFilter};
pub use store::{InvoiceStore, StoreError, StoreResult};
