//! # Engine Configuration
//!
//! Numbering and sales settings for the invoice engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GALAXY_INVOICE_PREFIX=shop1                                        │
//! │     GALAXY_MAX_ATTEMPTS=5                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/galaxy-pos/engine.toml (Linux)                           │
//! │     ~/Library/Application Support/com.galaxy.pos/engine.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     prefix "glxy", width 4, 3 attempts, no degraded numbering          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [numbering]
//! prefix = "glxy"
//! min_width = 4
//! max_attempts = 3
//! allow_degraded = false
//!
//! [sales]
//! default_tax_rate_bps = 0
//! enforce_discount_limit = false
//! ```

use galaxy_core::money::TaxRate;
use galaxy_core::validation::{validate_number_width, validate_prefix};
use galaxy_core::{ValidationError, DEFAULT_INVOICE_PREFIX, MIN_NUMBER_WIDTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub const ENV_INVOICE_PREFIX: &str = "GALAXY_INVOICE_PREFIX";
pub const ENV_NUMBER_WIDTH: &str = "GALAXY_NUMBER_WIDTH";
pub const ENV_MAX_ATTEMPTS: &str = "GALAXY_MAX_ATTEMPTS";
pub const ENV_ALLOW_DEGRADED: &str = "GALAXY_ALLOW_DEGRADED_NUMBERING";
pub const ENV_DEFAULT_TAX_RATE: &str = "GALAXY_DEFAULT_TAX_RATE";
pub const ENV_ENFORCE_DISCOUNT_LIMIT: &str = "GALAXY_ENFORCE_DISCOUNT_LIMIT";

// =============================================================================
// Numbering Settings
// =============================================================================

/// How invoice numbers are allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    /// Alphanumeric prefix of every number.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Minimum digits of the counter. Wider counters are never truncated.
    #[serde(default = "default_min_width")]
    pub min_width: usize,

    /// Allocate+append attempts before a number conflict surfaces as
    /// StoreUnavailable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Issue a timestamp-derived, non-sequential number when the store
    /// cannot be read, instead of failing.
    #[serde(default)]
    pub allow_degraded: bool,
}

fn default_prefix() -> String {
    DEFAULT_INVOICE_PREFIX.to_string()
}

fn default_min_width() -> usize {
    MIN_NUMBER_WIDTH
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for NumberingConfig {
    fn default() -> Self {
        NumberingConfig {
            prefix: default_prefix(),
            min_width: default_min_width(),
            max_attempts: default_max_attempts(),
            allow_degraded: false,
        }
    }
}

// =============================================================================
// Sales Settings
// =============================================================================

/// Defaults applied to every sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesConfig {
    /// Tax rate suggested to the UI when starting a cart.
    #[serde(default)]
    pub default_tax_rate_bps: u32,

    /// Reject lines priced below the product's discount limit.
    #[serde(default)]
    pub enforce_discount_limit: bool,
}

impl SalesConfig {
    pub fn default_tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.default_tax_rate_bps)
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub numbering: NumberingConfig,

    #[serde(default)]
    pub sales: SalesConfig,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml), when it exists
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Reads and parses a TOML file without env overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the rules every loaded config must satisfy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_prefix(&self.numbering.prefix)?;
        validate_number_width(self.numbering.min_width)?;

        if self.numbering.max_attempts == 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_attempts".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// [`load`](Self::load)).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup(ENV_INVOICE_PREFIX) {
            debug!(prefix = %prefix, "Overriding invoice prefix from environment");
            self.numbering.prefix = prefix.trim().to_string();
        }

        if let Some(value) = lookup(ENV_NUMBER_WIDTH) {
            self.numbering.min_width = parse_var(ENV_NUMBER_WIDTH, &value)?;
        }

        if let Some(value) = lookup(ENV_MAX_ATTEMPTS) {
            self.numbering.max_attempts = parse_var(ENV_MAX_ATTEMPTS, &value)?;
        }

        if let Some(value) = lookup(ENV_ALLOW_DEGRADED) {
            self.numbering.allow_degraded = parse_flag(ENV_ALLOW_DEGRADED, &value)?;
            if self.numbering.allow_degraded {
                warn!("Degraded invoice numbering enabled from environment");
            }
        }

        if let Some(value) = lookup(ENV_DEFAULT_TAX_RATE) {
            self.sales.default_tax_rate_bps = parse_var(ENV_DEFAULT_TAX_RATE, &value)?;
        }

        if let Some(value) = lookup(ENV_ENFORCE_DISCOUNT_LIMIT) {
            self.sales.enforce_discount_limit = parse_flag(ENV_ENFORCE_DISCOUNT_LIMIT, &value)?;
        }

        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "galaxy", "pos")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Returns the invoice prefix.
    pub fn prefix(&self) -> &str {
        &self.numbering.prefix
    }

    /// Config with a different prefix, for tests and multi-counter setups.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.numbering.prefix = prefix.into();
        self
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
