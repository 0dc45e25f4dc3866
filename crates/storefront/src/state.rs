//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use url::Url;

use stitchworks_core::CurrencyCode;

use crate::config::StorefrontConfig;
use crate::services::catalog::CatalogCache;
use crate::services::email::EmailService;
use crate::services::identity::{IdentityClient, IdentityError};
use crate::services::payments::{PaymentError, PaymentsClient};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid base_url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("base_url must have a host")]
    MissingHost,
    #[error("payment client: {0}")]
    Payments(#[from] PaymentError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and provider clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    origin: String,
    payments: PaymentsClient,
    identity: IdentityClient,
    email: Option<EmailService>,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or a provider client
    /// cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let origin = web_origin(&config.base_url)?;
        let payments = PaymentsClient::new(&config.payments)?;
        let identity = IdentityClient::new(&config.identity)?;
        let email = config
            .email
            .as_ref()
            .map(|email| EmailService::new(email, &config.base_url))
            .transpose()?;

        if email.is_none() {
            tracing::info!("SMTP not configured, notification emails disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                origin,
                payments,
                identity,
                email,
                catalog: CatalogCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Origin of the web client (`scheme://host[:port]`), for CORS.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Get a reference to the payment provider client.
    #[must_use]
    pub fn payments(&self) -> &PaymentsClient {
        &self.inner.payments
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// The email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Get a reference to the catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// Currency every price is charged in.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.config.payments.currency
    }
}

/// Reduce the configured base URL to its origin.
fn web_origin(base_url: &str) -> Result<String, StateError> {
    let url = Url::parse(base_url)?;
    if url.host_str().is_none() {
        return Err(StateError::MissingHost);
    }
    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_web_origin() {
        assert_eq!(
            web_origin("https://stitchworks.shop/shop").unwrap(),
            "https://stitchworks.shop"
        );
        assert_eq!(
            web_origin("http://localhost:5173").unwrap(),
            "http://localhost:5173"
        );
        assert!(web_origin("not a url").is_err());
    }
}
