//! # Product Catalog
//!
//! Collaborator interface for product data and stock.
//!
//! `decrement_stock` is the only stock write the engine performs. It clamps
//! at zero and never fails because stock is insufficient: overselling is
//! allowed, negative stock is not.

use async_trait::async_trait;
use galaxy_core::Product;
use std::sync::Arc;

use crate::store::StoreResult;

/// Read access to products plus the stock decrement used by commits.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>>;

    /// Lowers stock by `by`, clamped at 0. Returns the new quantity.
    ///
    /// ## Errors
    /// - `StoreError::NotFound` for an unknown product
    /// - `StoreError::Unavailable` when the backend fails
    async fn decrement_stock(&self, product_id: &str, by: i64) -> StoreResult<i64>;

    /// Used by product screens for duplicate-SKU checks.
    async fn find_by_sku(&self, sku: &str) -> StoreResult<Option<Product>>;
}

#[async_trait]
impl<T: ProductCatalog + ?Sized> ProductCatalog for Arc<T> {
    async fn get(&self, product_id: &str) -> StoreResult<Option<Product>> {
        (**self).get(product_id).await
    }

    async fn decrement_stock(&self, product_id: &str, by: i64) -> StoreResult<i64> {
        (**self).decrement_stock(product_id, by).await
    }

    async fn find_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        (**self).find_by_sku(sku).await
    }
}
