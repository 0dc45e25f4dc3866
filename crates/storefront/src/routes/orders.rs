//! Customer order history.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use stitchworks_core::OrderId;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::state::AppState;

/// Create the order history routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
}

/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(&user.id)
        .await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
///
/// Includes carrier and tracking number once shipped.
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    OrderRepository::new(state.pool())
        .get_for_user(id, &user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}
