//! In-process tests of the HTTP surface: health, auth gating, headers,
//! CORS, rate limiting and webhook signature checks.
//!
//! None of these reach the database or an external provider.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{StatusCode, header};
use stitchworks_integration_tests::{
    TEST_ORIGIN, json_body, request, send, sign_webhook, test_app,
};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_is_ok_without_database() {
    let app = test_app();
    let resp = send(&app, request("GET", "/health", "10.0.0.1").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = test_app();
    let resp = send(
        &app,
        request("GET", "/health/ready", "10.0.0.2").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_customer_routes_require_sign_in() {
    let app = test_app();
    for (method, uri) in [
        ("GET", "/api/me"),
        ("GET", "/api/cart"),
        ("GET", "/api/designs"),
        ("GET", "/api/orders"),
        ("GET", "/api/quotes"),
        ("POST", "/api/checkout"),
    ] {
        let resp = send(
            &app,
            request(method, uri, "10.0.1.1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        let body = json_body(resp).await;
        assert!(body["error"].is_string(), "{method} {uri} returns a JSON error");
    }
}

#[tokio::test]
async fn test_staff_routes_require_sign_in() {
    let app = test_app();
    for uri in [
        "/api/staff/dashboard",
        "/api/staff/orders",
        "/api/staff/quotes",
        "/api/staff/products",
        "/api/staff/design-templates",
        "/api/staff/transactions",
    ] {
        let resp = send(&app, request("GET", uri, "10.0.1.2").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_non_bearer_authorization_is_ignored() {
    let app = test_app();
    let resp = send(
        &app,
        request("GET", "/api/me", "10.0.1.3")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Headers
// ============================================================================

#[tokio::test]
async fn test_security_headers_on_api_errors() {
    let app = test_app();
    let resp = send(&app, request("GET", "/api/me", "10.0.2.1").body(Body::empty()).unwrap()).await;

    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["cache-control"], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let app = test_app();
    let resp = send(
        &app,
        request("GET", "/health", "10.0.2.2")
            .header("x-request-id", "edge-1234")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.headers()["x-request-id"], "edge-1234");
}

#[tokio::test]
async fn test_cors_preflight_allows_web_client() {
    let app = test_app();
    let resp = send(
        &app,
        request("OPTIONS", "/api/cart/items", "10.0.2.3")
            .header(header::ORIGIN, TEST_ORIGIN)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TEST_ORIGIN
    );
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_other_origins() {
    let app = test_app();
    let resp = send(
        &app,
        request("OPTIONS", "/api/cart", "10.0.2.4")
            .header(header::ORIGIN, "https://evil.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(
        !resp
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_api_burst_is_rate_limited_with_json_body() {
    let app = test_app();
    let mut last = None;
    for _ in 0..60 {
        let resp = send(&app, request("GET", "/api/me", "10.0.3.1").body(Body::empty()).unwrap()).await;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            last = Some(resp);
            break;
        }
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    let resp = last.expect("burst should be limited");
    let body = json_body(resp).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = test_app();
    for _ in 0..60 {
        send(&app, request("GET", "/api/me", "10.0.3.2").body(Body::empty()).unwrap()).await;
    }
    let other = send(&app, request("GET", "/api/me", "10.0.3.3").body(Body::empty()).unwrap()).await;
    assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Webhooks
// ============================================================================

const IGNORED_EVENT: &str =
    r#"{"id":"evt_test","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;

#[tokio::test]
async fn test_webhook_without_signature_is_rejected() {
    let app = test_app();
    let resp = send(
        &app,
        request("POST", "/api/webhooks/payments", "10.0.4.1")
            .body(Body::from(IGNORED_EVENT))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let app = test_app();
    let now = chrono::Utc::now().timestamp();
    let resp = send(
        &app,
        request("POST", "/api/webhooks/payments", "10.0.4.2")
            .header("stripe-signature", format!("t={now},v1=deadbeef"))
            .body(Body::from(IGNORED_EVENT))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_stale_signature_is_rejected() {
    let app = test_app();
    let stale = chrono::Utc::now().timestamp() - 3600;
    let resp = send(
        &app,
        request("POST", "/api/webhooks/payments", "10.0.4.3")
            .header("stripe-signature", sign_webhook(IGNORED_EVENT, stale))
            .body(Body::from(IGNORED_EVENT))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_unhandled_event_is_acknowledged() {
    let app = test_app();
    let now = chrono::Utc::now().timestamp();
    let resp = send(
        &app,
        request("POST", "/api/webhooks/payments", "10.0.4.4")
            .header("stripe-signature", sign_webhook(IGNORED_EVENT, now))
            .body(Body::from(IGNORED_EVENT))
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhooks_are_not_rate_limited() {
    let app = test_app();
    for _ in 0..60 {
        let resp = send(
            &app,
            request("POST", "/api/webhooks/payments", "10.0.4.5")
                .body(Body::from(IGNORED_EVENT))
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
