//! Live tests against a running storefront with a migrated, seeded database.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`sw-cli migrate`)
//! - The bundled catalog loaded (`sw-cli seed`)
//! - The server running (`cargo run -p stitchworks-storefront`)
//!
//! Run with: `cargo test -p stitchworks-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Base URL for the storefront API (configurable via environment).
fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

async fn get_json(client: &Client, path: &str) -> (StatusCode, Value) {
    let resp = client
        .get(format!("{}{path}", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    let status = resp.status();
    let body = resp.json().await.expect("Failed to parse JSON");
    (status, body)
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_ready_with_database() {
    let resp = Client::new()
        .get(format!("{}/health/ready", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_product_listing_and_detail() {
    let client = Client::new();

    let (status, products) = get_json(&client, "/api/products").await;
    assert_eq!(status, StatusCode::OK);
    let products = products.as_array().expect("product array");
    assert!(!products.is_empty(), "seeded catalog should not be empty");
    assert!(products.iter().all(|p| p["is_active"] == Value::Bool(true)));

    let id = products
        .first()
        .and_then(|p| p["id"].as_i64())
        .expect("product id");
    let (status, detail) = get_json(&client, &format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["colors"].is_array());
    assert!(
        detail["sizes"]
            .as_array()
            .is_some_and(|sizes| sizes.iter().all(|s| s["price_cents"].as_i64() > Some(0)))
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_category_filter() {
    let (status, products) = get_json(&Client::new(), "/api/products?category=hoodies").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        products
            .as_array()
            .expect("product array")
            .iter()
            .all(|p| p["category"] == "hoodies")
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_unknown_product_is_json_404() {
    let (status, body) = get_json(&Client::new(), "/api/products/999999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_published_templates_only() {
    let (status, templates) = get_json(&Client::new(), "/api/design-templates").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        templates
            .as_array()
            .expect("template array")
            .iter()
            .all(|t| t["is_published"] == Value::Bool(true))
    );
}
