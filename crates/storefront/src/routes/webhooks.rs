//! Payment provider webhook.
//!
//! Events are authenticated by signature, never by session. Handlers are
//! idempotent because the provider retries anything that is not a 2xx.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::{debug, info, instrument, warn};

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::services::checkout::finalize_payment;
use crate::services::payments::{Charge, PaymentError, PaymentIntent, WebhookEvent};
use crate::state::AppState;

/// Header carrying `t=<ts>,v1=<hex>`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Create the webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/payments", post(handle_payment_event))
}

/// POST /api/webhooks/payments
#[instrument(skip(state, headers, body))]
async fn handle_payment_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature header".into()))?;

    let event = state
        .payments()
        .verify_webhook(&body, signature)
        .map_err(|e| match e {
            PaymentError::Parse(msg) => AppError::BadRequest(format!("Invalid event: {msg}")),
            other => AppError::Payments(other),
        })?;

    debug!(event_id = %event.id, event_type = %event.event_type, "Payment webhook verified");
    dispatch(&state, &event).await?;
    Ok(StatusCode::OK)
}

fn event_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, AppError> {
    event
        .object()
        .map_err(|e| AppError::BadRequest(format!("Unexpected {} payload: {e}", event.event_type)))
}

async fn dispatch(state: &AppState, event: &WebhookEvent) -> Result<(), AppError> {
    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let intent: PaymentIntent = event_object(event)?;
            match finalize_payment(state, &intent.id, None).await {
                Ok(order) => {
                    info!(order_id = %order.id, payment_intent_id = %intent.id, "Order finalized from webhook");
                    Ok(())
                }
                // Retrying cannot fix these; acknowledge so the provider stops.
                Err(e @ (AppError::NotFound(_) | AppError::Conflict(_))) => {
                    warn!(payment_intent_id = %intent.id, error = %e, "Payment succeeded without a usable checkout");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        "payment_intent.payment_failed" => {
            let intent: PaymentIntent = event_object(event)?;
            warn!(
                payment_intent_id = %intent.id,
                amount = intent.amount,
                "Payment failed"
            );
            Ok(())
        }
        "charge.refunded" => {
            let charge: Charge = event_object(event)?;
            let Some(intent_id) = charge.payment_intent.as_deref() else {
                debug!(charge_id = %charge.id, "Refunded charge has no payment intent");
                return Ok(());
            };
            match OrderRepository::new(state.pool())
                .sync_refunded_total(intent_id, charge.amount_refunded)
                .await?
            {
                Some(order) => info!(
                    order_id = %order.id,
                    refunded = order.refunded_cents,
                    status = %order.status,
                    "Refund synced from provider"
                ),
                None => debug!(payment_intent_id = intent_id, "Refund for unknown order"),
            }
            Ok(())
        }
        other => {
            debug!(event_type = other, "Ignoring payment event");
            Ok(())
        }
    }
}
