//! Catalog queries: products with their color and size variants.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stitchworks_core::{ColorId, ProductId, ShirtSize, SizeVariantId};

use super::{RepositoryError, map_foreign_key_violation, map_unique_violation};
use crate::models::{
    ColorInput, Product, ProductColor, ProductDetail, ProductFilter, ProductInput, SizeVariant,
    SizeVariantInput,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    category: String,
    base_price_cents: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            category: row.category,
            base_price_cents: row.base_price_cents,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ColorRow {
    id: i32,
    product_id: i32,
    name: String,
    hex_code: String,
    front_image_url: Option<String>,
    back_image_url: Option<String>,
}

impl From<ColorRow> for ProductColor {
    fn from(row: ColorRow) -> Self {
        Self {
            id: ColorId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            hex_code: row.hex_code,
            front_image_url: row.front_image_url,
            back_image_url: row.back_image_url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SizeRow {
    id: i32,
    product_id: i32,
    size: ShirtSize,
    price_cents: i64,
    stock: i32,
}

impl From<SizeRow> for SizeVariant {
    fn from(row: SizeRow) -> Self {
        Self {
            id: SizeVariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            size: row.size,
            price_cents: row.price_cents,
            stock: row.stock,
        }
    }
}

/// Stock and price of one size variant, for the dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRow {
    pub product_id: i32,
    pub product_name: String,
    pub size: ShirtSize,
    pub price_cents: i64,
    pub stock: i32,
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, base_price_cents, is_active, created_at, updated_at";
const COLOR_COLUMNS: &str = "id, product_id, name, hex_code, front_image_url, back_image_url";
const SIZE_COLUMNS: &str = "id, product_id, size, price_cents, stock";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product
             WHERE ($1 OR is_active)
               AND ($2::TEXT IS NULL OR category = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.include_inactive)
        .bind(filter.category.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product with its colors and sizes.
    ///
    /// Archived products are only returned when `include_inactive` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(
        &self,
        id: ProductId,
        include_inactive: bool,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let mut details = self.details_for(&[id]).await?;
        Ok(details
            .remove(&id)
            .filter(|d| include_inactive || d.product.is_active))
    }

    /// Load several products with their variants in three queries.
    ///
    /// Missing ids are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn details_for(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductDetail>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw_ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let products = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1)"
        ))
        .bind(&raw_ids)
        .fetch_all(self.pool)
        .await?;

        let colors = sqlx::query_as::<_, ColorRow>(&format!(
            "SELECT {COLOR_COLUMNS} FROM storefront.product_color
             WHERE product_id = ANY($1) ORDER BY id"
        ))
        .bind(&raw_ids)
        .fetch_all(self.pool)
        .await?;

        let sizes = sqlx::query_as::<_, SizeRow>(&format!(
            "SELECT {SIZE_COLUMNS} FROM storefront.product_size
             WHERE product_id = ANY($1)"
        ))
        .bind(&raw_ids)
        .fetch_all(self.pool)
        .await?;

        let mut details: HashMap<ProductId, ProductDetail> = products
            .into_iter()
            .map(|row| {
                let product = Product::from(row);
                (
                    product.id,
                    ProductDetail {
                        product,
                        colors: Vec::new(),
                        sizes: Vec::new(),
                    },
                )
            })
            .collect();

        for color in colors.into_iter().map(ProductColor::from) {
            if let Some(detail) = details.get_mut(&color.product_id) {
                detail.colors.push(color);
            }
        }
        for size in sizes.into_iter().map(SizeVariant::from) {
            if let Some(detail) = details.get_mut(&size.product_id) {
                detail.sizes.push(size);
            }
        }
        for detail in details.values_mut() {
            detail.sizes.sort_by_key(|s| s.size);
        }

        Ok(details)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO storefront.product (name, description, category, base_price_cents, is_active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.category.trim())
        .bind(input.base_price_cents)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE storefront.product
             SET name = $2, description = $3, category = $4,
                 base_price_cents = $5, is_active = $6, updated_at = NOW()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.category.trim())
        .bind(input.base_price_cents)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Hide a product from the catalog. Orders keep their snapshots.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn archive(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.product SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Colors
    // =========================================================================

    /// Add a color variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_color(
        &self,
        product_id: ProductId,
        input: &ColorInput,
    ) -> Result<ProductColor, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>(&format!(
            "INSERT INTO storefront.product_color
                (product_id, name, hex_code, front_image_url, back_image_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLOR_COLUMNS}"
        ))
        .bind(product_id)
        .bind(input.name.trim())
        .bind(input.hex_code.to_ascii_uppercase())
        .bind(input.front_image_url.as_deref())
        .bind(input.back_image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match map_foreign_key_violation(e, "product") {
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })?;

        Ok(row.into())
    }

    /// Update a color variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the color does not exist.
    pub async fn update_color(
        &self,
        id: ColorId,
        input: &ColorInput,
    ) -> Result<ProductColor, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>(&format!(
            "UPDATE storefront.product_color
             SET name = $2, hex_code = $3, front_image_url = $4, back_image_url = $5
             WHERE id = $1
             RETURNING {COLOR_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.hex_code.to_ascii_uppercase())
        .bind(input.front_image_url.as_deref())
        .bind(input.back_image_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a color variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the color does not exist.
    /// Returns `RepositoryError::Conflict` if designs still use it.
    pub async fn delete_color(&self, id: ColorId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product_color WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_foreign_key_violation(e, "Color is used by saved designs"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Sizes
    // =========================================================================

    /// Add a size variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product already has this size.
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_size(
        &self,
        product_id: ProductId,
        input: &SizeVariantInput,
    ) -> Result<SizeVariant, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(&format!(
            "INSERT INTO storefront.product_size (product_id, size, price_cents, stock)
             VALUES ($1, $2, $3, $4)
             RETURNING {SIZE_COLUMNS}"
        ))
        .bind(product_id)
        .bind(input.size)
        .bind(input.price_cents)
        .bind(input.stock)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            map_unique_violation(e, &format!("Product already has size {}", input.size))
        })?;

        Ok(row.into())
    }

    /// Update a size variant's size, price and stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    /// Returns `RepositoryError::Conflict` if the new size is already taken.
    pub async fn update_size(
        &self,
        id: SizeVariantId,
        input: &SizeVariantInput,
    ) -> Result<SizeVariant, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(&format!(
            "UPDATE storefront.product_size
             SET size = $2, price_cents = $3, stock = $4
             WHERE id = $1
             RETURNING {SIZE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.size)
        .bind(input.price_cents)
        .bind(input.stock)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("Product already has size {}", input.size)))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a size variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn delete_size(&self, id: SizeVariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.product_size WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Every size variant with its product name, for inventory reporting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn inventory_rows(&self) -> Result<Vec<InventoryRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT p.id AS product_id, p.name AS product_name, s.size, s.price_cents, s.stock
             FROM storefront.product_size s
             JOIN storefront.product p ON p.id = s.product_id
             WHERE p.is_active
             ORDER BY p.name, s.id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Whether any products exist (the seeder uses this).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_empty(&self) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM storefront.product)")
                .fetch_one(self.pool)
                .await?;
        Ok(!exists)
    }
}
