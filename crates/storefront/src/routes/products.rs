//! Public catalog routes.
//!
//! Served from the catalog cache; staff writes invalidate it.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header::CACHE_CONTROL,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use stitchworks_core::{ColorId, ProductId};
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::{ProductDetail, ProductFilter};
use crate::state::AppState;

use super::page;

/// Browsers and CDNs may reuse catalog reads briefly.
const CATALOG_CACHE_CONTROL: &str = "public, max-age=60";

/// Create the catalog routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index))
        .route("/products/{id}", get(show))
}

/// Catalog listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/products
#[instrument(skip(state))]
async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        include_inactive: false,
        limit,
        offset,
    };

    let products = state.catalog().list(state.pool(), filter).await?;
    Ok((
        [(CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
        Json(products.as_ref().clone()),
    ))
}

/// GET /api/products/{id}
#[instrument(skip(state))]
async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state
        .catalog()
        .get(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

    Ok((
        [(CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
        Json(detail.as_ref().clone()),
    ))
}

/// Load an active product and check that `color_id` is one of its colors.
///
/// Reads the database directly: validation must not trust a stale cache.
///
/// # Errors
///
/// Returns `BadRequest` for unknown or archived products and foreign colors.
pub(crate) async fn active_product_with_color(
    state: &AppState,
    product_id: ProductId,
    color_id: ColorId,
) -> Result<ProductDetail, AppError> {
    let detail = ProductRepository::new(state.pool())
        .get_detail(product_id, false)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Product {product_id} is not available")))?;

    if detail.color(color_id).is_none() {
        return Err(AppError::BadRequest(format!(
            "Color {color_id} is not offered for {}",
            detail.product.name
        )));
    }
    Ok(detail)
}
