//! Saved customer designs.
//!
//! Every query is scoped by owner so a user can never read or modify another
//! user's design; a design owned by someone else looks exactly like a
//! missing one.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use stitchworks_core::{ColorId, DesignId, DesignTemplateId, ProductId, UserId};

use super::{RepositoryError, map_foreign_key_violation};
use crate::models::{Design, DesignInput};

#[derive(Debug, sqlx::FromRow)]
struct DesignRow {
    id: i32,
    user_id: String,
    product_id: i32,
    color_id: i32,
    template_id: Option<i32>,
    name: String,
    elements: Json<serde_json::Value>,
    preview_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DesignRow> for Design {
    fn from(row: DesignRow) -> Self {
        Self {
            id: DesignId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            color_id: ColorId::new(row.color_id),
            template_id: row.template_id.map(DesignTemplateId::new),
            name: row.name,
            elements: row.elements.0,
            preview_url: row.preview_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const DESIGN_COLUMNS: &str = "id, user_id, product_id, color_id, template_id, name, elements, \
                              preview_url, created_at, updated_at";

/// Repository for design database operations.
pub struct DesignRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DesignRepository<'a> {
    /// Create a new design repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save a new design.
    ///
    /// The caller has already checked that the color belongs to the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product, color or template
    /// does not exist.
    pub async fn create(
        &self,
        user_id: &UserId,
        input: &DesignInput,
    ) -> Result<Design, RepositoryError> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            "INSERT INTO storefront.design
                (user_id, product_id, color_id, template_id, name, elements, preview_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {DESIGN_COLUMNS}"
        ))
        .bind(user_id)
        .bind(input.product_id)
        .bind(input.color_id)
        .bind(input.template_id)
        .bind(input.name.trim())
        .bind(Json(&input.elements))
        .bind(input.preview_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, "Unknown product, color or template"))?;

        Ok(row.into())
    }

    /// List a user's designs, most recently edited first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Design>, RepositoryError> {
        let rows = sqlx::query_as::<_, DesignRow>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM storefront.design
             WHERE user_id = $1
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one of a user's designs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: DesignId,
        user_id: &UserId,
    ) -> Result<Option<Design>, RepositoryError> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            "SELECT {DESIGN_COLUMNS} FROM storefront.design WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Replace one of a user's designs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such design.
    pub async fn update(
        &self,
        id: DesignId,
        user_id: &UserId,
        input: &DesignInput,
    ) -> Result<Design, RepositoryError> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            "UPDATE storefront.design
             SET product_id = $3, color_id = $4, template_id = $5, name = $6,
                 elements = $7, preview_url = $8, updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {DESIGN_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.product_id)
        .bind(input.color_id)
        .bind(input.template_id)
        .bind(input.name.trim())
        .bind(Json(&input.elements))
        .bind(input.preview_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, "Unknown product, color or template"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete one of a user's designs.
    ///
    /// Cart lines and quotes referencing it keep working; the reference is
    /// cleared by the schema.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such design.
    pub async fn delete(&self, id: DesignId, user_id: &UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.design WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
