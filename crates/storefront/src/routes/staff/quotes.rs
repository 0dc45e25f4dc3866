//! Quote handling for staff.
//!
//! A response is an audit entry: a message, optionally a status change and,
//! when moving to `quoted`, the price offered.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use stitchworks_core::{Money, Permission, QuoteActor, QuoteId, QuoteStatus};
use tracing::{info, instrument};

use crate::db::{NewQuoteResponse, QuoteRepository};
use crate::error::AppError;
use crate::middleware::{RequireStaff, require_permission};
use crate::models::{Quote, QuoteResponse, QuoteWithResponses};
use crate::routes::page;
use crate::services::email::spawn_notification;
use crate::state::AppState;

/// Longest response message accepted.
const MAX_MESSAGE_LEN: usize = 5_000;

/// Create the staff quote routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(index))
        .route("/quotes/{id}", get(show))
        .route("/quotes/{id}/responses", post(respond))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub status: Option<QuoteStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Body for `POST /quotes/{id}/responses`.
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub message: String,
    /// New status; omit to add a note without changing status.
    pub status: Option<QuoteStatus>,
    pub quoted_price_cents: Option<i64>,
}

/// The updated quote and the response just recorded.
#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub quote: Quote,
    pub response: QuoteResponse,
}

/// Check a staff response against the quote's current status.
///
/// Returns the status the quote moves to.
///
/// # Errors
///
/// `BadRequest` for an empty message or a price that does not fit the
/// status, `Conflict` for a transition staff may not make.
pub fn validate_response(
    current: QuoteStatus,
    request: &RespondRequest,
) -> Result<QuoteStatus, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("A response message is required".to_string()));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::BadRequest(format!(
            "Response message is limited to {MAX_MESSAGE_LEN} characters"
        )));
    }

    let to = request.status.unwrap_or(current);
    if to != current && !current.can_transition_to(to, QuoteActor::Staff) {
        return Err(AppError::Conflict(format!(
            "A {current} quote cannot move to {to}"
        )));
    }
    if to == current && current.is_terminal() {
        return Err(AppError::Conflict(format!("Quote is already {current}")));
    }

    match (to, request.quoted_price_cents) {
        (QuoteStatus::Quoted, Some(price)) if price <= 0 => Err(AppError::BadRequest(
            "quoted_price_cents must be positive".to_string(),
        )),
        (QuoteStatus::Quoted, Some(_)) if to == current => Err(AppError::BadRequest(
            "Move the quote back to in_review before changing its price".to_string(),
        )),
        (QuoteStatus::Quoted, None) if to != current => Err(AppError::BadRequest(
            "Quoting requires a positive quoted_price_cents".to_string(),
        )),
        (QuoteStatus::Quoted, _) | (_, None) => Ok(to),
        (_, Some(_)) => Err(AppError::BadRequest(
            "A price can only be set when quoting".to_string(),
        )),
    }
}

/// GET /api/staff/quotes
///
/// Oldest first, so the queue is worked in order.
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Vec<Quote>>, AppError> {
    require_permission(&user, Permission::ManageQuotes)?;
    let (limit, offset) = page(query.limit, query.offset);
    Ok(Json(
        QuoteRepository::new(state.pool())
            .list(query.status, limit, offset)
            .await?,
    ))
}

/// GET /api/staff/quotes/{id}
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<QuoteId>,
) -> Result<Json<QuoteWithResponses>, AppError> {
    require_permission(&user, Permission::ManageQuotes)?;
    let quotes = QuoteRepository::new(state.pool());
    let quote = quotes
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quote {id} not found")))?;
    let responses = quotes.responses(id).await?;
    Ok(Json(QuoteWithResponses { quote, responses }))
}

/// POST /api/staff/quotes/{id}/responses
///
/// The customer is emailed the message.
#[instrument(skip(state, user, body), fields(staff = %user.id))]
async fn respond(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<QuoteId>,
    Json(body): Json<RespondRequest>,
) -> Result<(StatusCode, Json<RespondResponse>), AppError> {
    require_permission(&user, Permission::ManageQuotes)?;
    let quotes = QuoteRepository::new(state.pool());
    let current = quotes
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quote {id} not found")))?;

    let to = validate_response(current.status, &body)?;
    let message = body.message.trim();

    let (quote, response) = quotes
        .respond(
            id,
            &NewQuoteResponse {
                staff_user_id: &user.id,
                staff_name: user.display_name(),
                message,
                quoted_price_cents: body.quoted_price_cents,
                from_status: current.status,
                to_status: to,
            },
        )
        .await?;

    info!(quote_id = %id, from = %current.status, to = %to, "Quote response recorded");

    let price = quote
        .quoted_price_cents
        .filter(|_| quote.status == QuoteStatus::Quoted)
        .map(|cents| Money::from_cents(cents, state.currency()));
    let notify_quote = quote.clone();
    let notify_message = message.to_string();
    spawn_notification(state.email(), "quote_response", move |email| async move {
        email
            .send_quote_response(&notify_quote, &notify_message, price)
            .await
    });

    Ok((StatusCode::CREATED, Json(RespondResponse { quote, response })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(status: Option<QuoteStatus>, price: Option<i64>) -> RespondRequest {
        RespondRequest {
            message: "Thanks, looking into it".to_string(),
            status,
            quoted_price_cents: price,
        }
    }

    #[test]
    fn test_note_keeps_status() {
        let to = validate_response(QuoteStatus::InReview, &request(None, None)).unwrap();
        assert_eq!(to, QuoteStatus::InReview);
    }

    #[test]
    fn test_quote_requires_positive_price() {
        let err = validate_response(
            QuoteStatus::InReview,
            &request(Some(QuoteStatus::Quoted), None),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = validate_response(
            QuoteStatus::InReview,
            &request(Some(QuoteStatus::Quoted), Some(0)),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let to = validate_response(
            QuoteStatus::InReview,
            &request(Some(QuoteStatus::Quoted), Some(120_000)),
        )
        .unwrap();
        assert_eq!(to, QuoteStatus::Quoted);
    }

    #[test]
    fn test_pending_cannot_jump_to_quoted() {
        let err = validate_response(
            QuoteStatus::Pending,
            &request(Some(QuoteStatus::Quoted), Some(5_000)),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_price_only_when_quoting() {
        let err = validate_response(
            QuoteStatus::Pending,
            &request(Some(QuoteStatus::InReview), Some(5_000)),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_quoted_price_changes_only_through_review() {
        let err = validate_response(QuoteStatus::Quoted, &request(None, Some(9_000))).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = validate_response(
            QuoteStatus::Quoted,
            &request(Some(QuoteStatus::Quoted), Some(9_000)),
        )
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let to = validate_response(QuoteStatus::Quoted, &request(None, None)).unwrap();
        assert_eq!(to, QuoteStatus::Quoted);

        let to = validate_response(
            QuoteStatus::Quoted,
            &request(Some(QuoteStatus::InReview), None),
        )
        .unwrap();
        assert_eq!(to, QuoteStatus::InReview);

        let to = validate_response(
            QuoteStatus::InReview,
            &request(Some(QuoteStatus::Quoted), Some(9_000)),
        )
        .unwrap();
        assert_eq!(to, QuoteStatus::Quoted);
    }

    #[test]
    fn test_blank_message_rejected() {
        let mut req = request(None, None);
        req.message = "   ".to_string();
        assert!(validate_response(QuoteStatus::Pending, &req).is_err());
    }

    #[test]
    fn test_terminal_quote_rejects_notes() {
        let err = validate_response(QuoteStatus::Declined, &request(None, None)).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
