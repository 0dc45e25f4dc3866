//! Catalog management: products, colors and size variants.
//!
//! Every write drops the public catalog cache.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use stitchworks_core::{ColorId, Permission, ProductId, SizeVariantId};
use tracing::{info, instrument};

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::{RequireStaff, require_permission};
use crate::models::{
    ColorInput, Product, ProductColor, ProductDetail, ProductFilter, ProductInput, SizeVariant,
    SizeVariantInput,
};
use crate::routes::page;
use crate::state::AppState;

/// Create the catalog management routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/{id}", get(show).put(update).delete(archive))
        .route("/products/{id}/colors", post(add_color))
        .route("/colors/{id}", put(update_color).delete(delete_color))
        .route("/products/{id}/sizes", post(add_size))
        .route("/sizes/{id}", put(update_size).delete(delete_size))
}

#[derive(Debug, Deserialize)]
pub struct StaffProductQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/staff/products
///
/// Includes archived products and bypasses the cache.
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Query(query): Query<StaffProductQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    let (limit, offset) = page(query.limit, query.offset);
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        include_inactive: true,
        limit,
        offset,
    };
    Ok(Json(ProductRepository::new(state.pool()).list(&filter).await?))
}

/// POST /api/staff/products
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn create(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).create(&input).await?;
    state.catalog().invalidate();
    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/staff/products/{id}
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    ProductRepository::new(state.pool())
        .get_detail(id, true)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}

/// PUT /api/staff/products/{id}
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).update(id, &input).await?;
    state.catalog().invalidate();
    Ok(Json(product))
}

/// DELETE /api/staff/products/{id}
///
/// Archives rather than deletes: orders and designs keep referencing it.
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn archive(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    ProductRepository::new(state.pool()).archive(id).await?;
    state.catalog().invalidate();
    info!(product_id = %id, "Product archived");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/staff/products/{id}/colors
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn add_color(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(product_id): Path<ProductId>,
    Json(input): Json<ColorInput>,
) -> Result<(StatusCode, Json<ProductColor>), AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let color = ProductRepository::new(state.pool())
        .add_color(product_id, &input)
        .await?;
    state.catalog().invalidate();
    Ok((StatusCode::CREATED, Json(color)))
}

/// PUT /api/staff/colors/{id}
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn update_color(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<ColorId>,
    Json(input): Json<ColorInput>,
) -> Result<Json<ProductColor>, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let color = ProductRepository::new(state.pool())
        .update_color(id, &input)
        .await?;
    state.catalog().invalidate();
    Ok(Json(color))
}

/// DELETE /api/staff/colors/{id}
///
/// Refused with 409 while designs or cart lines still use the color.
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn delete_color(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<ColorId>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    ProductRepository::new(state.pool()).delete_color(id).await?;
    state.catalog().invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/staff/products/{id}/sizes
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn add_size(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(product_id): Path<ProductId>,
    Json(input): Json<SizeVariantInput>,
) -> Result<(StatusCode, Json<SizeVariant>), AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let size = ProductRepository::new(state.pool())
        .add_size(product_id, &input)
        .await?;
    state.catalog().invalidate();
    Ok((StatusCode::CREATED, Json(size)))
}

/// PUT /api/staff/sizes/{id}
///
/// Also the restock endpoint: `stock` is set, not added.
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn update_size(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<SizeVariantId>,
    Json(input): Json<SizeVariantInput>,
) -> Result<Json<SizeVariant>, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    input.validate().map_err(AppError::BadRequest)?;

    let size = ProductRepository::new(state.pool())
        .update_size(id, &input)
        .await?;
    state.catalog().invalidate();
    info!(size_id = %id, stock = size.stock, "Size variant updated");
    Ok(Json(size))
}

/// DELETE /api/staff/sizes/{id}
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn delete_size(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<SizeVariantId>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::ManageProducts)?;
    ProductRepository::new(state.pool()).delete_size(id).await?;
    state.catalog().invalidate();
    Ok(StatusCode::NO_CONTENT)
}
