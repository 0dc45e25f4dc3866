//! Current user route.

use axum::{Json, Router, routing::get};
use serde::Serialize;
use stitchworks_core::Permission;

use crate::middleware::RequireUser;
use crate::models::AuthenticatedUser;
use crate::state::AppState;

/// Create the current-user routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(show))
}

/// The signed-in user and what they may do.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: AuthenticatedUser,
    pub is_staff: bool,
    pub permissions: Vec<Permission>,
}

impl From<AuthenticatedUser> for MeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        let permissions = Permission::ALL
            .into_iter()
            .filter(|p| user.can(*p))
            .collect();
        Self {
            is_staff: user.is_staff(),
            permissions,
            user,
        }
    }
}

/// GET /api/me
async fn show(RequireUser(user): RequireUser) -> Json<MeResponse> {
    Json(user.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchworks_core::{StaffRole, UserId};

    fn user(role: Option<StaffRole>) -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::new("user_1"),
            email: Some("sam@example.com".to_string()),
            name: "Sam".to_string(),
            role,
        }
    }

    #[test]
    fn test_customer_has_no_permissions() {
        let me = MeResponse::from(user(None));
        assert!(!me.is_staff);
        assert!(me.permissions.is_empty());
    }

    #[test]
    fn test_shipper_permissions() {
        let me = MeResponse::from(user(Some(StaffRole::Shipper)));
        assert!(me.is_staff);
        assert_eq!(me.permissions, vec![Permission::ManageFulfillment]);
    }
}
