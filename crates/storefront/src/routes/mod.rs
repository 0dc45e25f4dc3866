//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database)
//!
//! # Customer API (/api)
//! GET  /me                     - Current user and permissions
//! GET  /products               - Active products (cached)
//! GET  /products/{id}          - Product with colors and sizes (cached)
//! GET  /design-templates       - Published templates
//! GET  /design-templates/{id}  - One published template
//! *    /designs[/{id}]         - Saved designs (owner only)
//! *    /cart[/items/{id}]      - Cart and cart lines
//! POST /checkout               - Start checkout, returns the client secret
//! POST /checkout/confirm       - Create the order for a paid intent
//! GET  /orders[/{id}]          - Order history and tracking
//! *    /quotes[/{id}/...]      - Bulk quote requests
//! POST /webhooks/payments      - Signed payment provider events
//!
//! # Staff API (/api/staff), role-gated per route
//! products, colors, sizes, design-templates, quotes, orders, dashboard,
//! transactions
//! ```

pub mod cart;
pub mod checkout;
pub mod design_templates;
pub mod designs;
pub mod me;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod staff;
pub mod webhooks;

use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{from_fn, map_response},
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    api_rate_limiter, checkout_rate_limiter, json_rate_limit_response, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Clamp client-supplied paging to sane bounds.
#[must_use]
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// Customer-facing API routes.
fn customer_routes() -> Router<AppState> {
    Router::new()
        .merge(me::router())
        .merge(products::router())
        .merge(design_templates::router())
        .merge(designs::router())
        .merge(cart::router())
        .merge(orders::router())
        .merge(quotes::router())
}

/// All routes under `/api`.
///
/// Checkout has its own, stricter rate limit; webhooks are not rate limited
/// because they come from the payment provider's shared egress IPs.
pub fn api_routes() -> Router<AppState> {
    let limited = Router::new()
        .merge(customer_routes())
        .nest("/staff", staff::router())
        .layer(api_rate_limiter());

    let checkout = checkout::router().layer(checkout_rate_limiter());

    Router::new()
        .merge(limited)
        .merge(checkout)
        .layer(map_response(json_rate_limit_response))
        .merge(webhooks::router())
}

/// CORS for the web client: one origin, credentials allowed.
fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = HeaderValue::from_str(origin).map_or_else(
        |_| {
            tracing::warn!(origin, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(std::iter::empty::<HeaderValue>())
        },
        AllowOrigin::exact,
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Build the complete application with middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.origin());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
    }

    #[test]
    fn test_page_clamped() {
        assert_eq!(page(Some(10_000), Some(-5)), (MAX_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(20)), (1, 20));
    }
}
