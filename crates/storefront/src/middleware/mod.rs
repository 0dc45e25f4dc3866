//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (web client origin only)
//! 5. Security headers
//! 6. Rate limiting (governor), per route group
//!
//! Authentication is done per handler with the `RequireUser` and
//! `RequireStaff` extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireStaff, RequireUser, require_permission};
pub use rate_limit::{api_rate_limiter, checkout_rate_limiter, json_rate_limit_response};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
