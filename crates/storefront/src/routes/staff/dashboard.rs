//! Staff dashboard.

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use stitchworks_core::Permission;
use tracing::instrument;

use crate::db::{OrderRepository, ProductRepository, QuoteRepository};
use crate::error::AppError;
use crate::middleware::{RequireStaff, require_permission};
use crate::services::stats::{DashboardInput, DashboardStats, compute_dashboard};
use crate::state::AppState;

/// Create the dashboard route.
pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(show))
}

/// GET /api/staff/dashboard
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> Result<Json<DashboardStats>, AppError> {
    require_permission(&user, Permission::ViewDashboard)?;

    let order_repo = OrderRepository::new(state.pool());
    let product_repo = ProductRepository::new(state.pool());
    let quote_repo = QuoteRepository::new(state.pool());
    let (orders, inventory, quote_counts) = tokio::try_join!(
        order_repo.stats_rows(),
        product_repo.inventory_rows(),
        quote_repo.count_by_status(),
    )?;

    let stats = compute_dashboard(&DashboardInput {
        orders: &orders,
        inventory: &inventory,
        quote_counts: &quote_counts,
        currency: state.currency(),
        low_stock_threshold: state.config().low_stock_threshold,
        now: Utc::now(),
    })
    .map_err(|e| AppError::Internal(format!("dashboard totals overflowed: {e}")))?;

    Ok(Json(stats))
}
