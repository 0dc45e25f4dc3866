//! Checkout routes.
//!
//! The web client confirms the card payment directly with the provider using
//! the client secret, then calls `/checkout/confirm`. The payment webhook
//! creates the same order if the client never comes back.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{Order, ShippingAddress};
use crate::services::checkout::{CheckoutSession, finalize_payment, start_checkout};
use crate::state::AppState;

/// Create the checkout routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(start))
        .route("/checkout/confirm", post(confirm))
}

/// Body for `POST /checkout`. Send `{}` when no address is collected.
#[derive(Debug, Default, Deserialize)]
pub struct StartCheckoutRequest {
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

/// Body for `POST /checkout/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub payment_intent_id: String,
}

/// POST /api/checkout
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn start(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<StartCheckoutRequest>,
) -> Result<Json<CheckoutSession>, AppError> {
    add_breadcrumb("checkout", "Checkout started", None);
    let session = start_checkout(&state, &user, body.shipping_address).await?;
    Ok(Json(session))
}

/// POST /api/checkout/confirm
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn confirm(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<Order>, AppError> {
    let intent_id = body.payment_intent_id.trim();
    if intent_id.is_empty() {
        return Err(AppError::BadRequest(
            "payment_intent_id is required".to_string(),
        ));
    }

    add_breadcrumb(
        "checkout",
        "Payment confirmation",
        Some(&[("payment_intent_id", intent_id)]),
    );
    let order = finalize_payment(&state, intent_id, Some(&user.id)).await?;
    Ok(Json(order))
}
