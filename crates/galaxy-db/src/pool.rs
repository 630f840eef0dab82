//! # Database Handle
//!
//! Opens the SQLite file that backs one terminal's catalog and invoices.
//!
//! ```text
//! DbConfig ──► Database::new ──► SqlitePool ─┬─► products()  ProductRepository
//!               (pragmas, migrations)        └─► invoices()  InvoiceRepository
//! ```
//!
//! File databases run in WAL journal mode so summary reads can proceed
//! while a commit holds the write lock. `:memory:` databases live only as
//! long as their single pooled connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::product::ProductRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings for [`Database::new`].
///
/// ```rust,ignore
/// let config = DbConfig::new("galaxy.db").max_connections(2).run_migrations(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection.
    pub connect_timeout: Duration,
    /// `None` never recycles idle connections.
    pub idle_timeout: Option<Duration>,
    /// Apply `migrations/sqlite` on open.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Defaults for a terminal database file: 5 connections, 30 s acquire
    /// timeout, migrations on. The file is created when missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private, empty database used by tests. Every pooled connection to
    /// `:memory:` would open a different database, so the pool is capped at
    /// one connection that never idles out.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared pool plus repository constructors. Cloning is cheap.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./galaxy.db")).await?;
/// let engine = InvoiceEngine::new(db.products(), db.invoices(), EngineConfig::load(None)?);
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    ///
    /// Foreign keys are switched on for every connection so deleting an
    /// invoice cascades to its lines.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let in_memory = config.is_in_memory();
        info!(path = %config.database_path.display(), in_memory, "Opening galaxy database");

        let base_options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                .create_if_missing(true)
        };

        let connect_options = base_options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.idle_timeout.map(|_| Duration::from_secs(1800)))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max = config.max_connections,
            min = config.min_connections,
            "Pool connected"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies migrations not yet recorded in `_sqlx_migrations`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `ProductCatalog` for an `InvoiceEngine`.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// `InvoiceStore` for an `InvoiceEngine`.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Repositories created from this handle fail after close.
    pub async fn close(&self) {
        debug!("Closing galaxy database");
        self.pool.close().await;
    }

    /// `true` while `SELECT 1` succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
