//! # Invoice Numbering
//!
//! Formatting and parsing of persisted invoice numbers.
//!
//! ## Format
//! ```text
//!   glxy0042
//!   ────┬───
//!   ▲   ▲
//!   │   └── counter, zero-padded to at least MIN_NUMBER_WIDTH digits
//!   └────── alphanumeric prefix
//!
//!   glxy9999 → glxy10000   (width grows, never truncated or re-padded)
//! ```
//!
//! ## Degraded Numbers
//! When the store cannot be read and degraded numbering is enabled, the
//! engine issues `<prefix>-T<yyyymmddHHMMSSmmm>`. The dash keeps such
//! numbers out of the sequential pattern, so [`InvoiceNumber::parse`]
//! rejects them and reporting can spot them.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::validate_prefix;
use crate::MIN_NUMBER_WIDTH;

/// A sequential invoice number: prefix plus positive counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceNumber {
    prefix: String,
    sequence: i64,
}

impl InvoiceNumber {
    /// Builds a number from its parts.
    pub fn new(prefix: impl Into<String>, sequence: i64) -> CoreResult<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        if sequence <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "sequence".to_string(),
            }
            .into());
        }
        Ok(InvoiceNumber { prefix, sequence })
    }

    /// First number for a prefix (`<prefix>0001`).
    pub fn first(prefix: impl Into<String>) -> CoreResult<Self> {
        InvoiceNumber::new(prefix, 1)
    }

    /// Parses a stored number that was issued under `prefix`.
    ///
    /// ## Example
    /// ```rust
    /// use galaxy_core::numbering::InvoiceNumber;
    ///
    /// let n = InvoiceNumber::parse("glxy0042", "glxy").unwrap();
    /// assert_eq!(n.sequence(), 42);
    /// assert!(InvoiceNumber::parse("glxy-T20240101120000000", "glxy").is_err());
    /// ```
    pub fn parse(number: &str, prefix: &str) -> CoreResult<Self> {
        let malformed = || CoreError::MalformedInvoiceNumber {
            number: number.to_string(),
            prefix: prefix.to_string(),
        };

        let digits = number.strip_prefix(prefix).ok_or_else(malformed)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let sequence: i64 = digits.parse().map_err(|_| malformed())?;
        if sequence <= 0 {
            return Err(malformed());
        }

        Ok(InvoiceNumber {
            prefix: prefix.to_string(),
            sequence,
        })
    }

    /// The number after this one.
    pub fn next(&self) -> CoreResult<Self> {
        let sequence = self
            .sequence
            .checked_add(1)
            .ok_or_else(|| ValidationError::overflow("sequence"))?;
        Ok(InvoiceNumber {
            prefix: self.prefix.clone(),
            sequence,
        })
    }

    /// Formats with the counter padded to at least `min_width` digits.
    pub fn format(&self, min_width: usize) -> String {
        format!("{}{:0width$}", self.prefix, self.sequence, width = min_width)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(MIN_NUMBER_WIDTH))
    }
}

/// Computes the number following `highest`, or the first number when the
/// store holds none for this prefix.
///
/// ## Example
/// ```rust
/// use galaxy_core::numbering::next_after;
///
/// assert_eq!(next_after(None, "glxy").unwrap().to_string(), "glxy0001");
/// assert_eq!(next_after(Some("glxy0041"), "glxy").unwrap().to_string(), "glxy0042");
/// ```
pub fn next_after(highest: Option<&str>, prefix: &str) -> CoreResult<InvoiceNumber> {
    match highest {
        None => InvoiceNumber::first(prefix),
        Some(number) => InvoiceNumber::parse(number, prefix)?.next(),
    }
}

/// Timestamp-derived number used only in degraded mode.
pub fn degraded_number(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-T{}", prefix, at.format("%Y%m%d%H%M%S%3f"))
}

/// True for numbers produced by [`degraded_number`] under `prefix`.
pub fn is_degraded(number: &str, prefix: &str) -> bool {
    number
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("-T"))
        .map(|stamp| !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

// =============================================================================
// Unit Tests
// =============================================================================
