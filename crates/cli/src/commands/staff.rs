//! Staff role management.
//!
//! Roles live in the identity provider's public metadata, so this command
//! talks to the provider directly rather than the database.
//!
//! # Environment Variables
//!
//! - `IDENTITY_SECRET_KEY` - Identity provider backend API key
//! - `IDENTITY_API_BASE` - Optional API base override

use stitchworks_core::{StaffRole, UserId};
use stitchworks_storefront::config::{ConfigError, IdentityConfig};
use stitchworks_storefront::services::identity::{IdentityClient, IdentityError};
use thiserror::Error;

/// Errors that can occur while changing a role.
#[derive(Debug, Error)]
pub enum StaffError {
    #[error("Invalid role: {0}. Valid roles: admin, designer, shipper, none")]
    InvalidRole(String),

    #[error("User ID is required")]
    MissingUser,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),
}

/// Parse a role argument. `none` clears the role.
fn parse_role(role: &str) -> Result<Option<StaffRole>, StaffError> {
    match role.trim().to_ascii_lowercase().as_str() {
        "none" | "" => Ok(None),
        other => other
            .parse::<StaffRole>()
            .map(Some)
            .map_err(|_| StaffError::InvalidRole(role.to_owned())),
    }
}

/// Grant, change or revoke a user's staff role.
///
/// # Errors
///
/// Returns `StaffError` if the arguments are invalid, configuration is
/// missing, or the provider rejects the update.
pub async fn set_role(user: &str, role: &str) -> Result<(), StaffError> {
    dotenvy::dotenv().ok();

    let role = parse_role(role)?;
    let user = user.trim();
    if user.is_empty() {
        return Err(StaffError::MissingUser);
    }
    let user_id = UserId::new(user);

    let client = IdentityClient::new(&IdentityConfig::from_env()?)?;
    let updated = client.set_role(&user_id, role).await?;

    match updated.role() {
        Some(role) => tracing::info!(user_id = %user_id, %role, "Staff role updated"),
        None => tracing::info!(user_id = %user_id, "Staff role revoked"),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("designer").unwrap(), Some(StaffRole::Designer));
        assert_eq!(parse_role("Admin").unwrap(), Some(StaffRole::Admin));
        assert_eq!(parse_role("none").unwrap(), None);
        assert!(matches!(
            parse_role("owner"),
            Err(StaffError::InvalidRole(_))
        ));
    }
}
