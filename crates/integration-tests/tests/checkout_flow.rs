//! Checkout and order creation against a real database.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`sw-cli migrate`)
//! - `DATABASE_URL` pointing at it
//!
//! The payment provider is an in-memory double, so no provider account is
//! needed. Every test creates its own product and user, so the tests can run
//! in parallel against a shared database.
//!
//! Run with: `cargo test -p stitchworks-integration-tests --test checkout_flow -- --ignored`

use axum::http::StatusCode;
use stitchworks_core::{ColorId, OrderStatus, ProductId, ShirtSize, SizeQuantities, UserId};
use stitchworks_integration_tests::{FakePaymentProvider, database_state};
use stitchworks_storefront::db::{CartRepository, OrderRepository, ProductRepository};
use stitchworks_storefront::models::{
    AuthenticatedUser, ColorInput, NewCartItem, ProductInput, SizeVariantInput,
};
use stitchworks_storefront::services::checkout::{finalize_payment, start_checkout};
use stitchworks_storefront::state::AppState;

const PRICE_M: i64 = 2_000;

fn customer() -> AuthenticatedUser {
    AuthenticatedUser {
        id: UserId::new(format!("user_test_{}", uuid::Uuid::new_v4().simple())),
        email: Some("sam@example.com".to_string()),
        name: "Sam Lee".to_string(),
        role: None,
    }
}

/// A product with one color and size M at `stock`.
struct TestProduct {
    id: ProductId,
    color: ColorId,
    second_color: ColorId,
}

async fn product_with_stock(state: &AppState, stock: i32) -> TestProduct {
    let products = ProductRepository::new(state.pool());
    let product = products
        .create(&ProductInput {
            name: format!("Checkout Tee {}", uuid::Uuid::new_v4().simple()),
            description: String::new(),
            category: "t-shirts".to_string(),
            base_price_cents: PRICE_M,
            is_active: true,
        })
        .await
        .expect("create product");
    let color = products
        .add_color(
            product.id,
            &ColorInput {
                name: "Black".to_string(),
                hex_code: "#000000".to_string(),
                front_image_url: None,
                back_image_url: None,
            },
        )
        .await
        .expect("add color");
    let second_color = products
        .add_color(
            product.id,
            &ColorInput {
                name: "White".to_string(),
                hex_code: "#FFFFFF".to_string(),
                front_image_url: None,
                back_image_url: None,
            },
        )
        .await
        .expect("add color");
    products
        .add_size(
            product.id,
            &SizeVariantInput {
                size: ShirtSize::M,
                price_cents: PRICE_M,
                stock,
            },
        )
        .await
        .expect("add size");

    TestProduct {
        id: product.id,
        color: color.id,
        second_color: second_color.id,
    }
}

async fn add_to_cart(
    state: &AppState,
    user: &AuthenticatedUser,
    product: ProductId,
    color: ColorId,
    quantity: u32,
) {
    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await.expect("cart");
    carts
        .add_item(
            cart.id,
            &NewCartItem {
                product_id: product,
                color_id: color,
                design_id: None,
                quantities: [(ShirtSize::M, quantity)].into_iter().collect::<SizeQuantities>(),
            },
        )
        .await
        .expect("add cart item");
}

async fn stock_of(state: &AppState, product: ProductId) -> i32 {
    ProductRepository::new(state.pool())
        .get_detail(product, true)
        .await
        .expect("load product")
        .and_then(|d| d.size(ShirtSize::M).map(|s| s.stock))
        .expect("size M")
}

async fn setup() -> (FakePaymentProvider, AppState) {
    let provider = FakePaymentProvider::start().await;
    let state = database_state(provider.base_url()).await;
    (provider, state)
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_paid_checkout_becomes_one_order() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 2).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");
    assert_eq!(session.amount.cents(), 2 * PRICE_M);

    provider.set_status(&session.payment_intent_id, "succeeded");
    let order = finalize_payment(&state, &session.payment_intent_id, Some(&user.id))
        .await
        .expect("finalize");
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.total_cents, 2 * PRICE_M);
    assert_eq!(order.units(), 2);
    assert_eq!(stock_of(&state, product.id).await, 3);

    // The webhook arriving after the confirm route changes nothing.
    let replay = finalize_payment(&state, &session.payment_intent_id, None)
        .await
        .expect("replay");
    assert_eq!(replay.id, order.id);
    assert_eq!(stock_of(&state, product.id).await, 3);

    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await.expect("cart");
    assert!(carts.items(cart.id).await.expect("items").is_empty());
    assert!(cart.payment_intent_id.is_none());
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_other_user_cannot_finalize() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let owner = customer();
    let stranger = customer();
    add_to_cart(&state, &owner, product.id, product.color, 1).await;

    let session = start_checkout(&state, &owner, None).await.expect("checkout");
    provider.set_status(&session.payment_intent_id, "succeeded");

    let err = finalize_payment(&state, &session.payment_intent_id, Some(&stranger.id))
        .await
        .expect_err("stranger before order exists");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    finalize_payment(&state, &session.payment_intent_id, Some(&owner.id))
        .await
        .expect("owner");

    let err = finalize_payment(&state, &session.payment_intent_id, Some(&stranger.id))
        .await
        .expect_err("stranger after order exists");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_amount_mismatch_creates_no_order() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 1).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");
    provider.set_amount(&session.payment_intent_id, PRICE_M - 1);
    provider.set_status(&session.payment_intent_id, "succeeded");

    let err = finalize_payment(&state, &session.payment_intent_id, Some(&user.id))
        .await
        .expect_err("mismatch");
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert!(
        OrderRepository::new(state.pool())
            .find_by_payment_intent(&session.payment_intent_id)
            .await
            .expect("lookup")
            .is_none()
    );
    assert_eq!(stock_of(&state, product.id).await, 5);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_unpaid_intent_is_not_finalized() {
    let (_provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 1).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");
    let err = finalize_payment(&state, &session.payment_intent_id, Some(&user.id))
        .await
        .expect_err("unpaid");
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_stock_never_goes_negative() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 2).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 2).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");

    // Someone else bought one while this customer was paying.
    sqlx::query("UPDATE storefront.product_size SET stock = 1 WHERE product_id = $1")
        .bind(product.id)
        .execute(state.pool())
        .await
        .expect("lower stock");

    provider.set_status(&session.payment_intent_id, "succeeded");
    finalize_payment(&state, &session.payment_intent_id, Some(&user.id))
        .await
        .expect("finalize");
    assert_eq!(stock_of(&state, product.id).await, 0);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_empty_cart_cannot_check_out() {
    let (_provider, state) = setup().await;
    let err = start_checkout(&state, &customer(), None)
        .await
        .expect_err("empty cart");
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_processing_payment_blocks_new_checkout() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 1).await;

    let first = start_checkout(&state, &user, None).await.expect("checkout");
    provider.set_status(&first.payment_intent_id, "processing");

    add_to_cart(&state, &user, product.id, product.color, 1).await;
    let err = start_checkout(&state, &user, None)
        .await
        .expect_err("payment in flight");
    assert_eq!(err.status(), StatusCode::CONFLICT);

    // The cart still points at the payment in flight, so it can be finalized.
    provider.set_status(&first.payment_intent_id, "succeeded");
    let order = finalize_payment(&state, &first.payment_intent_id, None)
        .await
        .expect("finalize");
    assert_eq!(order.total_cents, PRICE_M);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_intent_reused_until_canceled() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 1).await;

    let first = start_checkout(&state, &user, None).await.expect("checkout");
    provider.set_status(&first.payment_intent_id, "requires_action");

    add_to_cart(&state, &user, product.id, product.color, 1).await;
    let second = start_checkout(&state, &user, None).await.expect("checkout again");
    assert_eq!(second.payment_intent_id, first.payment_intent_id);
    assert_eq!(second.amount.cents(), 2 * PRICE_M);

    provider.set_status(&first.payment_intent_id, "canceled");
    let third = start_checkout(&state, &user, None).await.expect("fresh intent");
    assert_ne!(third.payment_intent_id, first.payment_intent_id);
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_lines_added_after_checkout_stay_in_cart() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 10).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 2).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");

    // Added in another tab while the payment form was open.
    add_to_cart(&state, &user, product.id, product.color, 1).await;
    add_to_cart(&state, &user, product.id, product.second_color, 3).await;

    provider.set_status(&session.payment_intent_id, "succeeded");
    let order = finalize_payment(&state, &session.payment_intent_id, Some(&user.id))
        .await
        .expect("finalize");
    assert_eq!(order.units(), 2);

    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await.expect("cart");
    let items = carts.items(cart.id).await.expect("items");
    assert_eq!(items.len(), 2);
    let black = items.iter().find(|i| i.color_id == product.color).expect("black line");
    assert_eq!(black.quantities.get(ShirtSize::M), 1);
    let white = items
        .iter()
        .find(|i| i.color_id == product.second_color)
        .expect("white line");
    assert_eq!(white.quantities.get(ShirtSize::M), 3);
    assert!(cart.checkout_snapshot.is_none());
}

#[tokio::test]
#[ignore = "Requires a migrated PostgreSQL database"]
async fn test_cancelled_order_stays_cancelled_after_refund_sync() {
    let (provider, state) = setup().await;
    let product = product_with_stock(&state, 5).await;
    let user = customer();
    add_to_cart(&state, &user, product.id, product.color, 1).await;

    let session = start_checkout(&state, &user, None).await.expect("checkout");
    provider.set_status(&session.payment_intent_id, "succeeded");
    let order = finalize_payment(&state, &session.payment_intent_id, None)
        .await
        .expect("finalize");

    let orders = OrderRepository::new(state.pool());
    let cancelled = orders
        .cancel_refunded(order.id, OrderStatus::Paid)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.refunded_cents, cancelled.total_cents);

    // The provider's charge.refunded webhook for the cancellation refund.
    let synced = orders
        .sync_refunded_total(&session.payment_intent_id, order.total_cents)
        .await
        .expect("sync")
        .expect("order exists");
    assert_eq!(synced.status, OrderStatus::Cancelled);

    assert!(
        orders
            .cancel_refunded(order.id, OrderStatus::Paid)
            .await
            .is_err(),
        "a cancelled order cannot be cancelled again"
    );
}
