//! # Engine Error Types
//!
//! The public error taxonomy of the invoice engine.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError (galaxy-core) ──────────────► EngineError::Validation │
//! │                                                                         │
//! │  CoreError::MalformedInvoiceNumber ──────────► StoreUnavailable        │
//! │  (store handed back a number we cannot continue from)                  │
//! │                                                                         │
//! │  StoreError::NotFound ───────────────────────► EngineError::NotFound   │
//! │  StoreError::Conflict (after retries) ───────► StoreUnavailable        │
//! │  StoreError::Unavailable ────────────────────► StoreUnavailable        │
//! │                                                                         │
//! │  Validation and NotFound never leave side effects behind.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use galaxy_core::{CoreError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by [`InvoiceEngine`](crate::InvoiceEngine) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Caller input violates an invoice rule. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A collaborator could not be read or written.
    ///
    /// ## When This Occurs
    /// - Store read/append failed
    /// - Number conflicts persisted past the retry bound
    /// - Store returned a highest number that does not parse
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True for input errors the cashier can fix.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => EngineError::Validation(v),
            malformed @ CoreError::MalformedInvoiceNumber { .. } => {
                EngineError::StoreUnavailable(malformed.to_string())
            }
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Conflict { .. } | StoreError::Unavailable(_) => {
                EngineError::StoreUnavailable(err.to_string())
            }
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while loading [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    /// Config values break a rule.
    #[error("Invalid engine configuration: {0}")]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: EngineError = StoreError::not_found("Invoice", "abc").into();
        assert_eq!(err, EngineError::not_found("Invoice", "abc"));

        let err: EngineError = StoreError::Unavailable("disk I/O error".to_string()).into();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));

        let err: EngineError = StoreError::Conflict {
            invoice_number: "glxy0001".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: EngineError = CoreError::Validation(ValidationError::EmptyCart).into();
        assert!(err.is_validation());

        let err: EngineError = CoreError::MalformedInvoiceNumber {
            number: "x".to_string(),
            prefix: "glxy".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::StoreUnavailable(msg) if msg.contains("'x'")));
    }
}
