//! # Product Repository
//!
//! SQLite-backed [`ProductCatalog`].
//!
//! ## Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How a Sale Lowers Stock                              │
//! │                                                                         │
//! │  Invoice committed: 3 × WID-1 (on hand: 2)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products                                                       │
//! │     SET quantity = MAX(quantity - 3, 0)   ← single statement           │
//! │   WHERE id = ?                                                         │
//! │  RETURNING quantity                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  on hand: 0   (oversold by 1, never negative)                          │
//! │                                                                         │
//! │  Two terminals selling the same product cannot lose an update:         │
//! │  the read and the write happen inside one SQLite statement.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use galaxy_core::validation::{validate_product_name, validate_sku};
use galaxy_core::Product;
use galaxy_engine::{ProductCatalog, StoreResult};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PRODUCT_COLUMNS: &str = r#"
    id,
    name,
    barcode,
    sku,
    quantity,
    price_cents,
    buying_price_cents,
    discount_limit_bps,
    created_at,
    updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_sku("WID-1").await?;
/// let left = repo.decrement(&product.id, 2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products ordered by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// An empty `id` is replaced with a fresh UUID.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    /// * `Err(DbError::Validation)` - bad name or SKU
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product_name(&product.name)?;
        if let Some(sku) = &product.sku {
            validate_sku(sku)?;
        }

        let mut product = product.clone();
        if product.id.is_empty() {
            product.id = generate_product_id();
        }
        product.quantity = product.quantity.max(0);

        debug!(id = %product.id, sku = ?product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, sku, quantity,
                price_cents, buying_price_cents, discount_limit_bps,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(product.quantity)
        .bind(product.price_cents)
        .bind(product.buying_price_cents)
        .bind(product.discount_limit_bps)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(product.sku.clone().unwrap_or_default()))?;

        Ok(product)
    }

    /// Updates an existing product.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product_name(&product.name)?;
        if let Some(sku) = &product.sku {
            validate_sku(sku)?;
        }

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                barcode = ?3,
                sku = ?4,
                quantity = ?5,
                price_cents = ?6,
                buying_price_cents = ?7,
                discount_limit_bps = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(product.quantity.max(0))
        .bind(product.price_cents)
        .bind(product.buying_price_cents)
        .bind(product.discount_limit_bps)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).with_value(product.sku.clone().unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Lowers stock by `by`, clamped at 0. Returns the new quantity.
    pub async fn decrement(&self, id: &str, by: i64) -> DbResult<i64> {
        debug!(id = %id, by = by, "Decrementing stock");

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET
                quantity = MAX(quantity - ?2, 0),
                updated_at = ?3
            WHERE id = ?1
            RETURNING quantity
            "#,
        )
        .bind(id)
        .bind(by.max(0))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        remaining.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>> {
        Ok(self.get_by_id(product_id).await?)
    }

    async fn decrement_stock(&self, product_id: &str, by: i64) -> StoreResult<i64> {
        Ok(self.decrement(product_id, by).await?)
    }

    async fn find_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        Ok(self.get_by_sku(sku).await?)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
