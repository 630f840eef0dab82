//! # galaxy-core: Pure Invoicing Logic for Galaxy POS
//!
//! This crate holds every rule that turns cart lines into invoice figures,
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Galaxy POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web UI (cashier / admin panels)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    galaxy-engine (InvoiceEngine)                │   │
//! │  │    commit_invoice, toggle_status, allocate_invoice_number       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ galaxy-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ numbering │  │   │
//! │  │   │  Invoice  │  │   Money   │  │ subtotal  │  │ glxy0042  │  │   │
//! │  │   │  Product  │  │  TaxRate  │  │ discount  │  │ parse/next│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Invoice, InvoiceLine, Discount, ...)
//! - [`money`] - Money and rate types with integer arithmetic
//! - [`totals`] - Subtotal / discount / tax / grand total computation
//! - [`numbering`] - Invoice number formatting and parsing
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use galaxy_core::money::{Money, TaxRate};
//! use galaxy_core::totals::{compute_totals, LineAmount};
//! use galaxy_core::types::Discount;
//!
//! let lines = [LineAmount::new(2, Money::from_cents(1000))];
//! let totals = compute_totals(&lines, Discount::none(), TaxRate::from_bps(500)).unwrap();
//!
//! assert_eq!(totals.subtotal.cents(), 2000);
//! assert_eq!(totals.tax.cents(), 100);
//! assert_eq!(totals.grand_total.cents(), 2100);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod numbering;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use numbering::InvoiceNumber;
pub use totals::{compute_totals, InvoiceTotals, LineAmount};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Invoice prefix used when nothing is configured.
pub const DEFAULT_INVOICE_PREFIX: &str = "glxy";

/// Minimum number of digits in the numeric part of an invoice number.
///
/// Wider counters are printed as-is (`glxy10000`), never truncated.
pub const MIN_NUMBER_WIDTH: usize = 4;

/// Maximum number of lines allowed on one invoice.
pub const MAX_INVOICE_LINES: usize = 500;
