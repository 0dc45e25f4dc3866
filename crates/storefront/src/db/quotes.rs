//! Requests for quote and their response trail.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use stitchworks_core::{
    DesignId, ProductId, QuoteId, QuoteResponseId, QuoteStatus, SizeQuantities, UserId,
};

use super::{RepositoryError, map_foreign_key_violation};
use crate::models::{NewQuote, Quote, QuoteResponse};

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: i32,
    user_id: String,
    contact_name: String,
    contact_email: String,
    phone: Option<String>,
    product_id: Option<i32>,
    design_id: Option<i32>,
    quantities: Json<SizeQuantities>,
    deadline: Option<NaiveDate>,
    notes: String,
    status: QuoteStatus,
    quoted_price_cents: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuoteRow> for Quote {
    fn from(row: QuoteRow) -> Self {
        Self {
            id: QuoteId::new(row.id),
            user_id: UserId::new(row.user_id),
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            phone: row.phone,
            product_id: row.product_id.map(ProductId::new),
            design_id: row.design_id.map(DesignId::new),
            quantities: row.quantities.0,
            deadline: row.deadline,
            notes: row.notes,
            status: row.status,
            quoted_price_cents: row.quoted_price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QuoteResponseRow {
    id: i32,
    quote_id: i32,
    staff_user_id: String,
    staff_name: String,
    message: String,
    quoted_price_cents: Option<i64>,
    from_status: QuoteStatus,
    to_status: QuoteStatus,
    created_at: DateTime<Utc>,
}

impl From<QuoteResponseRow> for QuoteResponse {
    fn from(row: QuoteResponseRow) -> Self {
        Self {
            id: QuoteResponseId::new(row.id),
            quote_id: QuoteId::new(row.quote_id),
            staff_user_id: UserId::new(row.staff_user_id),
            staff_name: row.staff_name,
            message: row.message,
            quoted_price_cents: row.quoted_price_cents,
            from_status: row.from_status,
            to_status: row.to_status,
            created_at: row.created_at,
        }
    }
}

const QUOTE_COLUMNS: &str = "id, user_id, contact_name, contact_email, phone, product_id, \
                             design_id, quantities, deadline, notes, status, \
                             quoted_price_cents, created_at, updated_at";
const RESPONSE_COLUMNS: &str = "id, quote_id, staff_user_id, staff_name, message, \
                                quoted_price_cents, from_status, to_status, created_at";

/// A staff response to append, with the status change it records.
#[derive(Debug, Clone)]
pub struct NewQuoteResponse<'r> {
    pub staff_user_id: &'r UserId,
    pub staff_name: &'r str,
    pub message: &'r str,
    pub quoted_price_cents: Option<i64>,
    pub from_status: QuoteStatus,
    pub to_status: QuoteStatus,
}

/// Repository for quote database operations.
pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    /// Create a new quote repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Submit a quote request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product or design does not
    /// exist.
    pub async fn create(&self, user_id: &UserId, input: &NewQuote) -> Result<Quote, RepositoryError> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!(
            "INSERT INTO storefront.request_quote
                (user_id, contact_name, contact_email, phone, product_id, design_id,
                 quantities, deadline, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {QUOTE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(input.contact_name.trim())
        .bind(input.contact_email.trim())
        .bind(input.phone.as_deref())
        .bind(input.product_id)
        .bind(input.design_id)
        .bind(Json(&input.quantities))
        .bind(input.deadline)
        .bind(&input.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, "Unknown product or design"))?;

        Ok(row.into())
    }

    /// A user's quotes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuoteRow>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM storefront.request_quote
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Any quote by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM storefront.request_quote WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// All quotes, optionally in one status. Oldest first so the queue is
    /// worked in order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<QuoteStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuoteRow>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM storefront.request_quote
             WHERE ($1::storefront.quote_status IS NULL OR status = $1)
             ORDER BY created_at, id
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Move a quote from `from` to `to`, optionally setting the quoted price.
    ///
    /// Applies only while the quote is still in `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the quote changed status in the
    /// meantime.
    pub async fn update_status(
        &self,
        id: QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
        quoted_price_cents: Option<i64>,
    ) -> Result<Quote, RepositoryError> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!(
            "UPDATE storefront.request_quote
             SET status = $3,
                 quoted_price_cents = COALESCE($4, quoted_price_cents),
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {QUOTE_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(quoted_price_cents)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Quote status changed, reload".to_string()))?;

        Ok(row.into())
    }

    /// Append a staff response and apply its status change atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the quote changed status in the
    /// meantime.
    pub async fn respond(
        &self,
        quote_id: QuoteId,
        response: &NewQuoteResponse<'_>,
    ) -> Result<(Quote, QuoteResponse), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let quote = sqlx::query_as::<_, QuoteRow>(&format!(
            "UPDATE storefront.request_quote
             SET status = $3,
                 quoted_price_cents = COALESCE($4, quoted_price_cents),
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {QUOTE_COLUMNS}"
        ))
        .bind(quote_id)
        .bind(response.from_status)
        .bind(response.to_status)
        .bind(response.quoted_price_cents)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("Quote status changed, reload".to_string()))?;

        let entry = sqlx::query_as::<_, QuoteResponseRow>(&format!(
            "INSERT INTO storefront.quote_response
                (quote_id, staff_user_id, staff_name, message, quoted_price_cents,
                 from_status, to_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {RESPONSE_COLUMNS}"
        ))
        .bind(quote_id)
        .bind(response.staff_user_id)
        .bind(response.staff_name)
        .bind(response.message)
        .bind(response.quoted_price_cents)
        .bind(response.from_status)
        .bind(response.to_status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((quote.into(), entry.into()))
    }

    /// A quote's responses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn responses(&self, quote_id: QuoteId) -> Result<Vec<QuoteResponse>, RepositoryError> {
        let rows = sqlx::query_as::<_, QuoteResponseRow>(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM storefront.quote_response
             WHERE quote_id = $1 ORDER BY created_at, id"
        ))
        .bind(quote_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of quotes in each status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<HashMap<QuoteStatus, i64>, RepositoryError> {
        let rows = sqlx::query_as::<_, (QuoteStatus, i64)>(
            "SELECT status, COUNT(*) FROM storefront.request_quote GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
