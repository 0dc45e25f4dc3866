//! Authentication extractors.
//!
//! The web client sends the identity provider's session token either as a
//! bearer token or in the provider's `__session` cookie. Tokens are verified
//! with the provider (cached briefly by `IdentityClient`).

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use stitchworks_core::Permission;

use crate::error::{AppError, set_sentry_user};
use crate::models::AuthenticatedUser;
use crate::services::identity::IdentityError;
use crate::state::AppState;

/// Cookie the identity provider's frontend SDK stores the session token in.
pub const SESSION_COOKIE: &str = "__session";

/// Extractor that requires a signed-in user.
///
/// Rejects with 401 when no token is present or the provider rejects it.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))?;

        let state = AppState::from_ref(state);
        let user = state
            .identity()
            .authenticate(&token)
            .await
            .map_err(|e| match e {
                IdentityError::InvalidToken => {
                    AppError::Unauthorized("Session expired, please sign in again".to_string())
                }
                other => AppError::Identity(other),
            })?;

        set_sentry_user(&user.id, user.email.as_deref());
        Ok(Self(user))
    }
}

/// Extractor that requires a user with any staff role.
///
/// Individual handlers still check the specific permission they need with
/// `require_permission`.
pub struct RequireStaff(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireStaff
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_staff() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-staff user on staff route");
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Fail with 403 unless the user's role grants `permission`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when the permission is missing.
pub fn require_permission(user: &AuthenticatedUser, permission: Permission) -> Result<(), AppError> {
    if user.can(permission) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, ?permission, role = ?user.role, "Permission denied");
        Err(AppError::Forbidden(format!(
            "Your role does not allow {}",
            permission_label(permission)
        )))
    }
}

const fn permission_label(permission: Permission) -> &'static str {
    match permission {
        Permission::ManageProducts => "managing products",
        Permission::ManageTemplates => "managing design templates",
        Permission::ManageQuotes => "managing quotes",
        Permission::ManageFulfillment => "managing fulfillment",
        Permission::ViewDashboard => "viewing the dashboard",
        Permission::ManageTransactions => "managing transactions",
    }
}

/// Bearer token first, then the session cookie.
fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;
    use stitchworks_core::{StaffRole, UserId};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        let p = parts(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(session_token(&p).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_token() {
        let p = parts(&[("cookie", "theme=dark; __session=tok123; other=1")]);
        assert_eq!(session_token(&p).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let p = parts(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "__session=from-cookie"),
        ]);
        assert_eq!(session_token(&p).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        assert!(session_token(&parts(&[])).is_none());
        assert!(session_token(&parts(&[("authorization", "Bearer ")])).is_none());
        assert!(session_token(&parts(&[("authorization", "Basic dXNlcg==")])).is_none());
        assert!(session_token(&parts(&[("cookie", "__session=")])).is_none());
    }

    #[test]
    fn test_require_permission() {
        let designer = AuthenticatedUser {
            id: UserId::new("user_d"),
            email: None,
            name: "Dee".to_string(),
            role: Some(StaffRole::Designer),
        };
        assert!(require_permission(&designer, Permission::ManageQuotes).is_ok());
        let err = require_permission(&designer, Permission::ManageTransactions).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
