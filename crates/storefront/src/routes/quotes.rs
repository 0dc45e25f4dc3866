//! Customer quote requests for bulk and custom orders.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use stitchworks_core::{QuoteActor, QuoteId, QuoteStatus, UserId};
use tracing::{info, instrument};

use crate::db::{DesignRepository, ProductRepository, QuoteRepository};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{NewQuote, Quote, QuoteWithResponses};
use crate::state::AppState;

/// Create the customer quote routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(index).post(create))
        .route("/quotes/{id}", get(show))
        .route("/quotes/{id}/accept", post(accept))
        .route("/quotes/{id}/decline", post(decline))
        .route("/quotes/{id}/cancel", post(cancel))
}

/// A quote the caller owns. Other users' quotes look missing.
async fn owned_quote(state: &AppState, id: QuoteId, user_id: &UserId) -> Result<Quote, AppError> {
    QuoteRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|q| &q.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Quote {id} not found")))
}

/// POST /api/quotes
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<NewQuote>,
) -> Result<(StatusCode, Json<Quote>), AppError> {
    input
        .validate(Utc::now().date_naive())
        .map_err(AppError::BadRequest)?;

    if let Some(product_id) = input.product_id {
        ProductRepository::new(state.pool())
            .get_detail(product_id, false)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} is not available")))?;
    }
    if let Some(design_id) = input.design_id {
        DesignRepository::new(state.pool())
            .get_for_user(design_id, &user.id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Design {design_id} not found")))?;
    }

    let quote = QuoteRepository::new(state.pool())
        .create(&user.id, &input)
        .await?;
    info!(
        quote_id = %quote.id,
        units = quote.quantities.total_units(),
        "Quote requested"
    );
    Ok((StatusCode::CREATED, Json(quote)))
}

/// GET /api/quotes
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Quote>>, AppError> {
    let quotes = QuoteRepository::new(state.pool())
        .list_for_user(&user.id)
        .await?;
    Ok(Json(quotes))
}

/// GET /api/quotes/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<QuoteId>,
) -> Result<Json<QuoteWithResponses>, AppError> {
    let quote = owned_quote(&state, id, &user.id).await?;
    let responses = QuoteRepository::new(state.pool()).responses(id).await?;
    Ok(Json(QuoteWithResponses { quote, responses }))
}

/// Apply a customer transition to one of the caller's quotes.
async fn transition(
    state: &AppState,
    user_id: &UserId,
    id: QuoteId,
    to: QuoteStatus,
) -> Result<Quote, AppError> {
    let quote = owned_quote(state, id, user_id).await?;
    if !quote.status.can_transition_to(to, QuoteActor::Customer) {
        return Err(AppError::Conflict(format!(
            "A {} quote cannot be {to}",
            quote.status
        )));
    }

    let updated = QuoteRepository::new(state.pool())
        .update_status(id, quote.status, to, None)
        .await?;
    info!(quote_id = %id, from = %quote.status, to = %to, "Quote updated by customer");
    Ok(updated)
}

/// POST /api/quotes/{id}/accept
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn accept(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<QuoteId>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(
        transition(&state, &user.id, id, QuoteStatus::Accepted).await?,
    ))
}

/// POST /api/quotes/{id}/decline
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn decline(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<QuoteId>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(
        transition(&state, &user.id, id, QuoteStatus::Declined).await?,
    ))
}

/// POST /api/quotes/{id}/cancel
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<QuoteId>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(
        transition(&state, &user.id, id, QuoteStatus::Cancelled).await?,
    ))
}
