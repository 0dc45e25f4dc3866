//! Identity provider HTTP client with a verified-session cache.

use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use stitchworks_core::{StaffRole, UserId};

use crate::config::IdentityConfig;
use crate::models::AuthenticatedUser;

/// How long a verified token is trusted without asking the provider again.
const SESSION_CACHE_TTL: Duration = Duration::from_secs(60);

/// Upper bound on cached sessions.
const SESSION_CACHE_CAPACITY: u64 = 10_000;

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The session token is missing, expired or revoked.
    #[error("Invalid session token")]
    InvalidToken,

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A session the provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub session_id: String,
    pub user_id: UserId,
}

/// A user profile at the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    primary_email_address_id: Option<String>,
    #[serde(default)]
    public_metadata: PublicMetadata,
}

#[derive(Debug, Clone, Deserialize)]
struct EmailAddress {
    id: String,
    email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PublicMetadata {
    role: Option<String>,
}

impl IdentityUser {
    /// The primary email, falling back to the first one on file.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|id| {
            self.email_addresses
                .iter()
                .find(|address| address.id == id)
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|address| address.email_address.as_str())
    }

    /// `"First Last"`, trimmed; empty when the provider has no name.
    #[must_use]
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Staff role from public metadata; unknown values mean customer.
    #[must_use]
    pub fn role(&self) -> Option<StaffRole> {
        StaffRole::from_metadata(self.public_metadata.role.as_deref())
    }

    /// Flatten into the request-level user.
    #[must_use]
    pub fn into_authenticated(self) -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::new(self.id.clone()),
            email: self.email().map(String::from),
            name: self.full_name(),
            role: self.role(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    user_id: String,
    status: String,
}

/// Identity provider API client.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    api_base: String,
    sessions: Cache<String, AuthenticatedUser>,
}

impl IdentityClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| IdentityError::Parse(format!("Invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        let sessions = Cache::builder()
            .max_capacity(SESSION_CACHE_CAPACITY)
            .time_to_live(SESSION_CACHE_TTL)
            .build();

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            sessions,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(IdentityError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Verify a session token.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` if the provider rejects the
    /// token or the session is not active.
    #[instrument(skip_all)]
    pub async fn verify_session(&self, token: &str) -> Result<VerifiedSession, IdentityError> {
        let response = self
            .client
            .post(self.url("/v1/sessions/verify"))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            debug!(status = status.as_u16(), "Session token rejected");
            return Err(IdentityError::InvalidToken);
        }

        let session: SessionResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        if session.status != "active" {
            debug!(session_status = %session.status, "Session not active");
            return Err(IdentityError::InvalidToken);
        }

        Ok(VerifiedSession {
            session_id: session.id,
            user_id: UserId::new(session.user_id),
        })
    }

    /// Load a user profile.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user(&self, user_id: &UserId) -> Result<IdentityUser, IdentityError> {
        Self::check(
            self.client
                .get(self.url(&format!("/v1/users/{user_id}")))
                .send()
                .await?,
        )
        .await?
        .json()
        .await
        .map_err(|e| IdentityError::Parse(e.to_string()))
    }

    /// Set or clear a user's staff role.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_role(
        &self,
        user_id: &UserId,
        role: Option<StaffRole>,
    ) -> Result<IdentityUser, IdentityError> {
        let role_value = role.map(|r| r.to_string());
        let body = serde_json::json!({ "public_metadata": { "role": role_value } });

        let user: IdentityUser = Self::check(
            self.client
                .patch(self.url(&format!("/v1/users/{user_id}/metadata")))
                .json(&body)
                .send()
                .await?,
        )
        .await?
        .json()
        .await
        .map_err(|e| IdentityError::Parse(e.to_string()))?;

        // Role changes must not wait for cached sessions to expire.
        self.sessions.invalidate_all();
        Ok(user)
    }

    /// Resolve a session token to a user, using the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidToken` for bad tokens, or the provider
    /// error if it could not be reached.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, IdentityError> {
        if let Some(user) = self.sessions.get(token).await {
            return Ok(user);
        }

        let session = self.verify_session(token).await?;
        let user = self
            .get_user(&session.user_id)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to load user for verified session"))?
            .into_authenticated();

        self.sessions.insert(token.to_string(), user.clone()).await;
        Ok(user)
    }
}
