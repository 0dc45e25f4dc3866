//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! Users live at the identity provider; every customer-owned row carries the
//! provider's user id as text.
//!
//! ## Tables
//!
//! - `product`, `product_color`, `product_size` - Catalog
//! - `design` - Saved customer designs (JSONB elements)
//! - `design_template` - Staff-curated starting points
//! - `cart`, `cart_item` - One cart per user, with the pending checkout snapshot
//! - `customer_order` - Paid orders (JSONB line snapshots)
//! - `request_quote`, `quote_response` - Quote requests and their audit trail
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p stitchworks-cli -- migrate
//! ```

pub mod carts;
pub mod design_templates;
pub mod designs;
pub mod orders;
pub mod products;
pub mod quotes;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use design_templates::DesignTemplateRepository;
pub use designs::DesignRepository;
pub use orders::{OrderRepository, OrderStatsRow};
pub use products::{InventoryRow, ProductRepository};
pub use quotes::{NewQuoteResponse, QuoteRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate size on a product).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(e)
}

/// Map a foreign-key violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_foreign_key_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
