//! Staff-curated design templates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use stitchworks_core::{DesignTemplateId, UserId};

use super::RepositoryError;
use crate::models::{DesignTemplate, DesignTemplateInput};

#[derive(Debug, sqlx::FromRow)]
struct DesignTemplateRow {
    id: i32,
    name: String,
    category: String,
    elements: Json<serde_json::Value>,
    preview_url: Option<String>,
    is_published: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DesignTemplateRow> for DesignTemplate {
    fn from(row: DesignTemplateRow) -> Self {
        Self {
            id: DesignTemplateId::new(row.id),
            name: row.name,
            category: row.category,
            elements: row.elements.0,
            preview_url: row.preview_url,
            is_published: row.is_published,
            created_by: UserId::new(row.created_by),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TEMPLATE_COLUMNS: &str = "id, name, category, elements, preview_url, is_published, \
                                created_by, created_at, updated_at";

/// Repository for design template database operations.
pub struct DesignTemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DesignTemplateRepository<'a> {
    /// Create a new design template repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List published templates, optionally in one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_published(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<DesignTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM storefront.design_template
             WHERE is_published AND ($1::TEXT IS NULL OR category = $1)
             ORDER BY name"
        ))
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List every template, drafts included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<DesignTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM storefront.design_template
             ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a template by ID, published or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: DesignTemplateId,
    ) -> Result<Option<DesignTemplate>, RepositoryError> {
        let row = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM storefront.design_template WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create an unpublished template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        input: &DesignTemplateInput,
        created_by: &UserId,
    ) -> Result<DesignTemplate, RepositoryError> {
        self.insert(input, created_by, false).await
    }

    /// Insert a template with an explicit published flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(
        &self,
        input: &DesignTemplateInput,
        created_by: &UserId,
        is_published: bool,
    ) -> Result<DesignTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "INSERT INTO storefront.design_template
                (name, category, elements, preview_url, is_published, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(input.category.trim())
        .bind(Json(&input.elements))
        .bind(input.preview_url.as_deref())
        .bind(is_published)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Replace a template's content. The published flag is untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn update(
        &self,
        id: DesignTemplateId,
        input: &DesignTemplateInput,
    ) -> Result<DesignTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "UPDATE storefront.design_template
             SET name = $2, category = $3, elements = $4, preview_url = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.category.trim())
        .bind(Json(&input.elements))
        .bind(input.preview_url.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Publish or unpublish a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn set_published(
        &self,
        id: DesignTemplateId,
        is_published: bool,
    ) -> Result<DesignTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, DesignTemplateRow>(&format!(
            "UPDATE storefront.design_template
             SET is_published = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a template. Designs started from it keep their elements.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the template does not exist.
    pub async fn delete(&self, id: DesignTemplateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.design_template WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
