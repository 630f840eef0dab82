//! # Repository Module
//!
//! SQLite implementations of the invoice engine's collaborators.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InvoiceEngine<C, S>                                                   │
//! │       │                                                                 │
//! │       ├── C: ProductCatalog ──► ProductRepository ──► products         │
//! │       │                                                                 │
//! │       └── S: InvoiceStore   ──► InvoiceRepository ──► invoices         │
//! │                                                   └─► invoice_lines    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository also exposes inherent methods returning [`DbResult`]
//! for callers that want database errors rather than collaborator errors.
//!
//! [`DbResult`]: crate::error::DbResult

pub mod invoice;
pub mod product;
