//! End-to-end walks through the quote and order lifecycles, checking the
//! staff-side validation against the shared transition tables.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use stitchworks_core::{OrderStatus, Permission, QuoteActor, QuoteStatus, StaffRole};
use stitchworks_storefront::routes::staff::orders::validate_status_change;
use stitchworks_storefront::routes::staff::quotes::{RespondRequest, validate_response};

fn respond(message: &str, status: Option<QuoteStatus>, price: Option<i64>) -> RespondRequest {
    RespondRequest {
        message: message.to_string(),
        status,
        quoted_price_cents: price,
    }
}

// ============================================================================
// Quotes
// ============================================================================

#[test]
fn test_quote_negotiation_to_completion() {
    let mut status = QuoteStatus::Pending;

    status = validate_response(status, &respond("Looking at this now", Some(QuoteStatus::InReview), None)).unwrap();
    assert_eq!(status, QuoteStatus::InReview);

    // Notes keep the current status.
    status = validate_response(status, &respond("Need the artwork as SVG", None, None)).unwrap();
    assert_eq!(status, QuoteStatus::InReview);

    status = validate_response(
        status,
        &respond("200 shirts at $11.50", Some(QuoteStatus::Quoted), Some(230_000)),
    )
    .unwrap();
    assert_eq!(status, QuoteStatus::Quoted);

    assert!(status.can_transition_to(QuoteStatus::Accepted, QuoteActor::Customer));
    status = QuoteStatus::Accepted;

    status = validate_response(status, &respond("Printed and shipped", Some(QuoteStatus::Completed), None)).unwrap();
    assert_eq!(status, QuoteStatus::Completed);
    assert!(status.is_terminal());

    let err = validate_response(status, &respond("One more thing", None, None)).unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[test]
fn test_requote_after_customer_pushback() {
    let status = validate_response(
        QuoteStatus::Quoted,
        &respond("Revisiting the price", Some(QuoteStatus::InReview), None),
    )
    .unwrap();
    let status = validate_response(
        status,
        &respond("Revised quote", Some(QuoteStatus::Quoted), Some(199_000)),
    )
    .unwrap();
    assert_eq!(status, QuoteStatus::Quoted);
}

#[test]
fn test_staff_cannot_act_for_customer() {
    let err = validate_response(
        QuoteStatus::Quoted,
        &respond("Accepting on their behalf", Some(QuoteStatus::Accepted), None),
    )
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
}

#[test]
fn test_customer_cannot_cancel_once_quoted() {
    assert!(!QuoteStatus::Quoted.can_transition_to(QuoteStatus::Cancelled, QuoteActor::Customer));
    assert!(QuoteStatus::Pending.can_transition_to(QuoteStatus::Cancelled, QuoteActor::Customer));
}

#[test]
fn test_terminal_quotes_have_no_exits() {
    for from in QuoteStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
        for to in QuoteStatus::ALL {
            for actor in [QuoteActor::Customer, QuoteActor::Staff] {
                assert!(!from.can_transition_to(to, actor), "{from} -> {to}");
            }
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

#[test]
fn test_order_fulfillment_path() {
    assert!(validate_status_change(OrderStatus::Paid, OrderStatus::Processing).is_ok());
    // Shipping goes through the ship endpoint so tracking is recorded.
    assert_eq!(
        validate_status_change(OrderStatus::Processing, OrderStatus::Shipped)
            .unwrap_err()
            .status(),
        StatusCode::BAD_REQUEST
    );
    assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
    assert!(validate_status_change(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());
}

#[test]
fn test_cancelled_orders_stay_cancelled() {
    for to in OrderStatus::ALL {
        assert!(!OrderStatus::Cancelled.can_transition_to(to));
    }
    assert_eq!(
        validate_status_change(OrderStatus::Shipped, OrderStatus::Cancelled)
            .unwrap_err()
            .status(),
        StatusCode::CONFLICT
    );
}

#[test]
fn test_cancelled_and_refunded_are_not_revenue() {
    let revenue: Vec<_> = OrderStatus::ALL
        .into_iter()
        .filter(|s| s.counts_as_revenue())
        .collect();
    assert_eq!(
        revenue,
        vec![
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered
        ]
    );
}

// ============================================================================
// Staff roles
// ============================================================================

#[test]
fn test_role_permission_matrix() {
    let granted = |role: StaffRole| -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| role.allows(*p))
            .collect()
    };

    assert_eq!(granted(StaffRole::Admin), Permission::ALL.to_vec());
    assert_eq!(
        granted(StaffRole::Designer),
        vec![Permission::ManageTemplates, Permission::ManageQuotes]
    );
    assert_eq!(granted(StaffRole::Shipper), vec![Permission::ManageFulfillment]);
}
