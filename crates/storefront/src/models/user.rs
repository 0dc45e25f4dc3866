//! The signed-in user as seen by request handlers.
//!
//! Users live at the identity provider; nothing here is stored locally.

use serde::Serialize;

use stitchworks_core::{Permission, StaffRole, UserId};

/// A user whose session token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    /// Primary email, when the provider has one on file.
    pub email: Option<String>,
    pub name: String,
    /// `None` for customers.
    pub role: Option<StaffRole>,
}

impl AuthenticatedUser {
    /// Whether the user holds any staff role.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_some()
    }

    /// Whether the user's role grants `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.role.is_some_and(|role| role.allows(permission))
    }

    /// Name to show on staff responses and emails.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.email.as_deref().unwrap_or(self.id.as_str())
        } else {
            &self.name
        }
    }
}
