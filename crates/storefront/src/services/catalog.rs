//! Cached catalog reads.
//!
//! Product listings and details are read far more often than they change,
//! so they are held in a TTL cache. Staff product writes and completed
//! checkouts (which change stock) invalidate it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use stitchworks_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::{Product, ProductDetail, ProductFilter};

const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL cache in front of `ProductRepository`.
#[derive(Clone)]
pub struct CatalogCache {
    listings: Cache<ProductFilter, Arc<Vec<Product>>>,
    details: Cache<ProductId, Arc<ProductDetail>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listings: Cache::builder()
                .max_capacity(500)
                .time_to_live(CATALOG_TTL)
                .build(),
            details: Cache::builder()
                .max_capacity(2_000)
                .time_to_live(CATALOG_TTL)
                .build(),
        }
    }

    /// Active product listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading from the database fails.
    pub async fn list(
        &self,
        pool: &PgPool,
        filter: ProductFilter,
    ) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(hit) = self.listings.get(&filter).await {
            return Ok(hit);
        }
        let products = Arc::new(ProductRepository::new(pool).list(&filter).await?);
        self.listings.insert(filter, Arc::clone(&products)).await;
        Ok(products)
    }

    /// Active product with variants; `None` for missing or archived products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if loading from the database fails.
    pub async fn get(
        &self,
        pool: &PgPool,
        id: ProductId,
    ) -> Result<Option<Arc<ProductDetail>>, RepositoryError> {
        if let Some(hit) = self.details.get(&id).await {
            return Ok(Some(hit));
        }
        let Some(detail) = ProductRepository::new(pool).get_detail(id, false).await? else {
            return Ok(None);
        };
        let detail = Arc::new(detail);
        self.details.insert(id, Arc::clone(&detail)).await;
        Ok(Some(detail))
    }

    /// Drop everything cached.
    pub fn invalidate(&self) {
        self.listings.invalidate_all();
        self.details.invalidate_all();
    }
}
