//! Identity provider integration.
//!
//! Sessions are issued by a hosted identity provider (Clerk-compatible API).
//! The server never sees passwords: it verifies the session token the web
//! client sends, then loads the user's profile and staff role metadata.

mod client;

pub use client::{IdentityClient, IdentityError, IdentityUser, VerifiedSession};
