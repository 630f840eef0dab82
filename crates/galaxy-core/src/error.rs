//! # Error Types
//!
//! Domain-specific error types for galaxy-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  galaxy-core errors (this file)                                        │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  galaxy-engine errors                                                  │
//! │  ├── StoreError       - Collaborator (catalog/store) failures          │
//! │  └── EngineError      - Validation / NotFound / StoreUnavailable       │
//! │                                                                         │
//! │  galaxy-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError ← StoreError ← DbError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, product id, number)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invoice number does not have the `<prefix><digits>` shape.
    ///
    /// ## When This Occurs
    /// - Store returned a number written under a different prefix
    /// - Store returned a degraded (timestamp) number where a sequential
    ///   one was expected
    /// - Numeric part overflows the counter type
    #[error("Invoice number '{number}' is not a sequential number for prefix '{prefix}'")]
    MalformedInvoiceNumber { number: String, prefix: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller-supplied cart, discount or tax data
/// violates the invoice invariants. They never cause side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., prefix with punctuation).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A cart line references a product the catalog does not know.
    #[error("Unknown product: {product_id}")]
    UnknownProduct { product_id: String },

    /// A cart or invoice has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Arithmetic on the given amounts would overflow.
    #[error("{field} is too large to compute")]
    Overflow { field: String },

    /// Line price is below what the product's discount limit allows.
    #[error("Unit amount {unit_amount_cents} for product {product_id} is below the allowed minimum {min_cents}")]
    DiscountLimitExceeded {
        product_id: String,
        unit_amount_cents: i64,
        min_cents: i64,
    },
}

impl ValidationError {
    /// Creates a `Required` error for the given field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates an `Overflow` error for the given field.
    pub fn overflow(field: impl Into<String>) -> Self {
        ValidationError::Overflow {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
