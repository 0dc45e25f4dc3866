//! Payment provider transactions, read straight from the provider.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use stitchworks_core::Permission;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::{RequireStaff, require_permission};
use crate::services::payments::PaymentIntentList;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 25;
const MAX_LIMIT: u32 = 100;

/// Create the transactions route.
pub fn router() -> Router<AppState> {
    Router::new().route("/transactions", get(index))
}

/// Cursor paging as the provider does it: pass the last id seen.
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<u32>,
    pub starting_after: Option<String>,
}

/// GET /api/staff/transactions
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<PaymentIntentList>, AppError> {
    require_permission(&user, Permission::ManageTransactions)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let cursor = query.starting_after.as_deref().filter(|c| !c.is_empty());

    let page = state
        .payments()
        .list_payment_intents(limit, cursor)
        .await?;
    Ok(Json(page))
}
