//! Fulfillment and refunds.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use stitchworks_core::{OrderId, OrderStatus, Permission};
use tracing::{info, instrument, warn};

use crate::db::OrderRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::{RequireStaff, require_permission};
use crate::models::Order;
use crate::routes::page;
use crate::services::email::spawn_notification;
use crate::state::AppState;

/// Create the staff order routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
        .route("/orders/{id}/ship", post(ship))
        .route("/orders/{id}/refund", post(refund))
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ShipRequest {
    pub carrier: String,
    pub tracking_number: String,
}

/// Body for a refund; omit `amount_cents` to refund everything left.
#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    pub amount_cents: Option<i64>,
}

/// Check a plain status change.
///
/// Shipping needs tracking details and refunds go through the provider, so
/// both have their own endpoints.
///
/// # Errors
///
/// `BadRequest` for `shipped` or `refunded`, `Conflict` for a transition the
/// lifecycle does not allow.
pub fn validate_status_change(current: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
    match to {
        OrderStatus::Shipped => Err(AppError::BadRequest(
            "Use the ship endpoint to add tracking details".to_string(),
        )),
        OrderStatus::Refunded => Err(AppError::BadRequest(
            "Use the refund endpoint to refund an order".to_string(),
        )),
        _ if current.can_transition_to(to) => Ok(()),
        _ => Err(AppError::Conflict(format!(
            "A {current} order cannot move to {to}"
        ))),
    }
}

/// What cancelling `order` must refund first, if anything.
///
/// A cancelled order is terminal, so money still held for it has to go
/// back to the customer as part of the cancellation.
#[must_use]
pub fn cancellation_refund(order: &Order, to: OrderStatus) -> Option<i64> {
    let left = order.refundable_cents();
    (to == OrderStatus::Cancelled && left > 0).then_some(left)
}

/// Work out how much to refund.
///
/// # Errors
///
/// `Conflict` when nothing is refundable, `BadRequest` for a non-positive
/// amount or one above what is left.
pub fn refund_amount(order: &Order, requested: Option<i64>) -> Result<i64, AppError> {
    let refundable = order.refundable_cents();
    if refundable <= 0 || !order.status.can_transition_to(OrderStatus::Refunded) {
        return Err(AppError::Conflict(format!(
            "Order {} has nothing left to refund",
            order.id
        )));
    }
    match requested {
        None => Ok(refundable),
        Some(amount) if amount <= 0 => Err(AppError::BadRequest(
            "Refund amount must be positive".to_string(),
        )),
        Some(amount) if amount > refundable => Err(AppError::BadRequest(format!(
            "Refund exceeds the {refundable} cents left on the order"
        ))),
        Some(amount) => Ok(amount),
    }
}

async fn load(state: &AppState, id: OrderId) -> Result<Order, AppError> {
    OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}

/// GET /api/staff/orders
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    require_permission(&user, Permission::ManageFulfillment)?;
    let (limit, offset) = page(query.limit, query.offset);
    Ok(Json(
        OrderRepository::new(state.pool())
            .list(query.status, limit, offset)
            .await?,
    ))
}

/// GET /api/staff/orders/{id}
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    require_permission(&user, Permission::ManageFulfillment)?;
    Ok(Json(load(&state, id).await?))
}

/// POST /api/staff/orders/{id}/status
///
/// Cancelling an order that still holds money refunds the rest first, which
/// needs the transactions permission.
#[instrument(skip(state, user, body), fields(staff = %user.id))]
async fn update_status(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>, AppError> {
    require_permission(&user, Permission::ManageFulfillment)?;
    let order = load(&state, id).await?;
    validate_status_change(order.status, body.status)?;

    let orders = OrderRepository::new(state.pool());
    let updated = if let Some(amount) = cancellation_refund(&order, body.status) {
        require_permission(&user, Permission::ManageTransactions)?;
        let order_ref = id.to_string();
        add_breadcrumb("refund", "Cancellation refund", Some(&[("order_id", order_ref.as_str())]));
        let refund = state
            .payments()
            .create_refund(&order.payment_intent_id, Some(amount))
            .await?;
        info!(order_id = %id, refund_id = %refund.id, amount, "Cancellation refunded");

        orders
            .cancel_refunded(id, order.status)
            .await
            .inspect_err(|e| {
                warn!(order_id = %id, refund_id = %refund.id, error = %e, "Refund issued but cancellation not recorded");
            })?
    } else {
        orders.update_status(id, order.status, body.status).await?
    };

    info!(order_id = %id, from = %order.status, to = %updated.status, "Order status changed");
    Ok(Json(updated))
}

/// POST /api/staff/orders/{id}/ship
#[instrument(skip(state, user, body), fields(staff = %user.id))]
async fn ship(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<ShipRequest>,
) -> Result<Json<Order>, AppError> {
    require_permission(&user, Permission::ManageFulfillment)?;
    let carrier = body.carrier.trim();
    let tracking = body.tracking_number.trim();
    if carrier.is_empty() || tracking.is_empty() {
        return Err(AppError::BadRequest(
            "Carrier and tracking number are required".to_string(),
        ));
    }

    let order = load(&state, id).await?;
    if !order.status.can_transition_to(OrderStatus::Shipped) {
        return Err(AppError::Conflict(format!(
            "A {} order cannot be shipped",
            order.status
        )));
    }

    let shipped = OrderRepository::new(state.pool())
        .mark_shipped(id, order.status, carrier, tracking)
        .await?;
    info!(order_id = %id, carrier, "Order shipped");

    let notify = shipped.clone();
    spawn_notification(state.email(), "order_shipped", move |email| async move {
        email.send_order_shipped(&notify).await
    });

    Ok(Json(shipped))
}

/// POST /api/staff/orders/{id}/refund
///
/// Refunds at the provider first, then records it. If recording fails the
/// provider's `charge.refunded` webhook brings the order up to date.
#[instrument(skip(state, user, body), fields(staff = %user.id))]
async fn refund(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<RefundRequest>,
) -> Result<Json<Order>, AppError> {
    require_permission(&user, Permission::ManageTransactions)?;
    let order = load(&state, id).await?;
    let amount = refund_amount(&order, body.amount_cents)?;

    let order_ref = id.to_string();
    add_breadcrumb("refund", "Refund requested", Some(&[("order_id", order_ref.as_str())]));
    let refund = state
        .payments()
        .create_refund(&order.payment_intent_id, Some(amount))
        .await?;

    let updated = OrderRepository::new(state.pool())
        .record_refund(id, amount)
        .await
        .inspect_err(|e| {
            warn!(order_id = %id, refund_id = %refund.id, error = %e, "Refund issued but not recorded");
        })?;

    info!(
        order_id = %id,
        refund_id = %refund.id,
        amount,
        status = %updated.status,
        "Order refunded"
    );
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use stitchworks_core::{CurrencyCode, UserId};

    use super::*;

    fn order(status: OrderStatus, total: i64, refunded: i64) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            user_id: UserId::new("user_1"),
            email: "sam@example.com".to_string(),
            payment_intent_id: "pi_123".to_string(),
            status,
            items: Vec::new(),
            subtotal_cents: total,
            total_cents: total,
            refunded_cents: refunded,
            currency: CurrencyCode::Usd,
            shipping_address: None,
            carrier: None,
            tracking_number: None,
            shipped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_change_rules() {
        assert!(validate_status_change(OrderStatus::Paid, OrderStatus::Processing).is_ok());
        assert!(validate_status_change(OrderStatus::Shipped, OrderStatus::Delivered).is_ok());

        let err =
            validate_status_change(OrderStatus::Processing, OrderStatus::Shipped).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err =
            validate_status_change(OrderStatus::Delivered, OrderStatus::Processing).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = validate_status_change(OrderStatus::Cancelled, OrderStatus::Paid).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_cancelling_paid_order_refunds_the_rest() {
        let paid = order(OrderStatus::Paid, 5_000, 0);
        assert!(validate_status_change(paid.status, OrderStatus::Cancelled).is_ok());
        assert_eq!(cancellation_refund(&paid, OrderStatus::Cancelled), Some(5_000));

        let partly = order(OrderStatus::Processing, 5_000, 1_500);
        assert_eq!(cancellation_refund(&partly, OrderStatus::Cancelled), Some(3_500));

        let settled = order(OrderStatus::Paid, 5_000, 5_000);
        assert_eq!(cancellation_refund(&settled, OrderStatus::Cancelled), None);

        assert_eq!(cancellation_refund(&paid, OrderStatus::Processing), None);
    }

    #[test]
    fn test_full_refund_by_default() {
        let o = order(OrderStatus::Delivered, 5_000, 1_000);
        assert_eq!(refund_amount(&o, None).unwrap(), 4_000);
    }

    #[test]
    fn test_refund_cannot_exceed_remaining() {
        let o = order(OrderStatus::Paid, 5_000, 1_000);
        let err = refund_amount(&o, Some(4_001)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(refund_amount(&o, Some(4_000)).unwrap(), 4_000);
    }

    #[test]
    fn test_refund_rejects_non_positive() {
        let o = order(OrderStatus::Paid, 5_000, 0);
        assert!(refund_amount(&o, Some(0)).is_err());
        assert!(refund_amount(&o, Some(-5)).is_err());
    }

    #[test]
    fn test_refunded_or_cancelled_order_not_refundable() {
        let err = refund_amount(&order(OrderStatus::Refunded, 5_000, 5_000), None).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = refund_amount(&order(OrderStatus::Cancelled, 5_000, 0), None).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
