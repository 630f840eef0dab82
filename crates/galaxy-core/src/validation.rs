//! # Validation Module
//!
//! Input validation rules for carts, discounts and invoice numbering.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web UI                                                       │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: InvoiceEngine (Rust)                                         │
//! │  ├── Catalog lookups (product exists)                                  │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Store (SQLite)                                               │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE invoice_number                                             │
//! │                                                                         │
//! │  Every check here runs before any side effect.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use galaxy_core::validation::{validate_prefix, validate_quantity};
//!
//! validate_prefix("glxy").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::totals::MAX_DISCOUNT_BPS;
use crate::types::{Discount, DiscountKind};
use crate::MAX_INVOICE_LINES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted invoice prefix.
pub const MAX_PREFIX_LEN: usize = 16;

/// Longest accepted actor / cashier identity.
pub const MAX_ACTOR_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an invoice number prefix.
///
/// ## Rules
/// - Must not be empty
/// - At most 16 characters
/// - ASCII letters and digits only, so the counter boundary is unambiguous
///   and degraded (`-T`) numbers can never look sequential
///
/// ## Example
/// ```rust
/// use galaxy_core::validation::validate_prefix;
///
/// assert!(validate_prefix("glxy").is_ok());
/// assert!(validate_prefix("").is_err());
/// assert!(validate_prefix("gl-xy").is_err());
/// ```
pub fn validate_prefix(prefix: &str) -> ValidationResult<()> {
    if prefix.is_empty() {
        return Err(ValidationError::required("invoice prefix"));
    }

    if prefix.len() > MAX_PREFIX_LEN {
        return Err(ValidationError::TooLong {
            field: "invoice prefix".to_string(),
            max: MAX_PREFIX_LEN,
        });
    }

    if !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "invoice prefix".to_string(),
            reason: "must contain only ASCII letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an actor identity (cashier id, toggling user).
///
/// ## Returns
/// The trimmed identity.
pub fn validate_actor(field: &str, actor: &str) -> ValidationResult<String> {
    let actor = actor.trim();

    if actor.is_empty() {
        return Err(ValidationError::required(field));
    }

    if actor.chars().count() > MAX_ACTOR_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ACTOR_LEN,
        });
    }

    Ok(actor.to_string())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use galaxy_core::validation::validate_sku;
///
/// assert!(validate_sku("WID-001").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - No upper bound; totals report overflow separately
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Commit                                                           │
/// │                                                                         │
/// │  Line quantity: 5                                                      │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       └── OK → stock is NOT checked; overselling clamps stock at 0     │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit amount. Zero is allowed (free items).
///
/// ## Example
/// ```rust
/// use galaxy_core::money::Money;
/// use galaxy_core::validation::validate_unit_amount;
///
/// assert!(validate_unit_amount(Money::from_cents(1099)).is_ok());
/// assert!(validate_unit_amount(Money::zero()).is_ok());
/// assert!(validate_unit_amount(Money::from_cents(-100)).is_err());
/// ```
pub fn validate_unit_amount(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit amount".to_string(),
        });
    }

    Ok(())
}

/// Validates an amount received from the customer.
pub fn validate_amount_received(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount received".to_string(),
        });
    }

    Ok(())
}

/// Validates a discount.
///
/// ## Rules
/// - Value must not be negative
/// - Percentages are at most 10000 bps (100%)
/// - Flat amounts have no upper bound here; totals clamp them
pub fn validate_discount(discount: &Discount) -> ValidationResult<()> {
    if discount.value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount".to_string(),
        });
    }

    if discount.kind == DiscountKind::Percentage && discount.value > MAX_DISCOUNT_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount percentage".to_string(),
            min: 0,
            max: MAX_DISCOUNT_BPS,
        });
    }

    Ok(())
}

/// Validates the minimum digit width of invoice numbers.
pub fn validate_number_width(width: usize) -> ValidationResult<()> {
    if !(1..=12).contains(&width) {
        return Err(ValidationError::OutOfRange {
            field: "number width".to_string(),
            min: 1,
            max: 12,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a cart.
///
/// ## Rules
/// - At least one line
/// - At most MAX_INVOICE_LINES (500)
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::EmptyCart);
    }

    if lines > MAX_INVOICE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_INVOICE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("glxy").is_ok());
        assert!(validate_prefix("INV2024").is_ok());

        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("gl xy").is_err());
        assert!(validate_prefix("glxy-").is_err());
        assert!(validate_prefix(&"a".repeat(17)).is_err());
    }

    #[test]
    fn test_validate_actor() {
        assert_eq!(validate_actor("actor", "  ali ").unwrap(), "ali");
        assert_eq!(
            validate_actor("actor", "   "),
            Err(ValidationError::required("actor"))
        );
        assert!(validate_actor("cashier_id", &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("WID-001").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Widget").is_ok());
        assert!(validate_product_name(" ").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(10_000).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(&Discount::none()).is_ok());
        assert!(validate_discount(&Discount::percent(100)).is_ok());
        assert!(validate_discount(&Discount::amount(Money::from_cents(1_000_000))).is_ok());

        assert!(validate_discount(&Discount::percentage_bps(10_001)).is_err());
        assert!(validate_discount(&Discount::percentage_bps(-1)).is_err());
        assert!(validate_discount(&Discount::amount(Money::from_cents(-1))).is_err());
    }

    #[test]
    fn test_validate_number_width() {
        assert!(validate_number_width(4).is_ok());
        assert!(validate_number_width(0).is_err());
        assert!(validate_number_width(13).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert_eq!(validate_cart_size(0), Err(ValidationError::EmptyCart));
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_INVOICE_LINES).is_ok());
        assert!(validate_cart_size(MAX_INVOICE_LINES + 1).is_err());
    }
}
