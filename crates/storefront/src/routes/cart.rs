//! Cart routes.
//!
//! Each user has exactly one cart, created on first use. Prices are never
//! stored on cart lines; `GET /cart` prices the cart from current catalog
//! data every time.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use stitchworks_core::{CartId, CartItemId, SizeQuantities};
use tracing::{info, instrument};

use crate::db::{CartRepository, DesignRepository, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{AuthenticatedUser, CartItem, NewCartItem, ProductDetail};
use crate::services::checkout::{PricedCart, check_stock, price_cart, stock_levels};
use crate::state::AppState;

use super::products::active_product_with_color;

/// Create the cart routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).delete(clear))
        .route("/cart/items", post(add_item))
        .route("/cart/items/{id}", patch(update_item).delete(remove_item))
}

/// The cart with its current pricing.
///
/// `issue` explains why the cart cannot be checked out right now (an archived
/// product, a size no longer offered, short stock); `priced` is then absent
/// or reflects what is still purchasable.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub items: Vec<CartItem>,
    pub priced: Option<PricedCart>,
    pub issue: Option<String>,
}

/// Body for `PATCH /cart/items/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantities: SizeQuantities,
}

/// Quantities must be non-empty and every size must be offered.
fn check_quantities(detail: &ProductDetail, quantities: &SizeQuantities) -> Result<(), AppError> {
    if quantities.is_empty() || quantities.total_units() == 0 {
        return Err(AppError::BadRequest(
            "Choose at least one size and quantity".to_string(),
        ));
    }
    if let Some((size, _)) = quantities.iter().find(|(size, _)| detail.size(*size).is_none()) {
        return Err(AppError::BadRequest(format!(
            "{} is not available in size {size}",
            detail.product.name
        )));
    }
    Ok(())
}

async fn view(state: &AppState, user: &AuthenticatedUser) -> Result<CartView, AppError> {
    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    let items = carts.items(cart.id).await?;

    if items.is_empty() {
        return Ok(CartView {
            id: cart.id,
            items,
            priced: None,
            issue: None,
        });
    }

    let product_ids: Vec<_> = items.iter().map(|i| i.product_id).collect();
    let catalog = ProductRepository::new(state.pool())
        .details_for(&product_ids)
        .await?;

    let (priced, issue) = match price_cart(&items, &catalog, state.currency()) {
        Ok(priced) => {
            let issue = check_stock(&priced.order_lines(), &stock_levels(&catalog))
                .err()
                .map(|e| e.to_string());
            (Some(priced), issue)
        }
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(CartView {
        id: cart.id,
        items,
        priced,
        issue,
    })
}

/// GET /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(view(&state, &user).await?))
}

/// POST /api/cart/items
///
/// A line with the same product, color and design is merged into the
/// existing line.
#[instrument(skip(state, user, item), fields(user_id = %user.id))]
async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(item): Json<NewCartItem>,
) -> Result<(StatusCode, Json<CartItem>), AppError> {
    let detail = active_product_with_color(&state, item.product_id, item.color_id).await?;
    check_quantities(&detail, &item.quantities)?;

    if let Some(design_id) = item.design_id {
        let design = DesignRepository::new(state.pool())
            .get_for_user(design_id, &user.id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Design {design_id} not found")))?;
        if design.product_id != item.product_id {
            return Err(AppError::BadRequest(
                "Design was made for a different product".to_string(),
            ));
        }
    }

    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    let line = carts.add_item(cart.id, &item).await?;

    info!(
        cart_id = %cart.id,
        product_id = %item.product_id,
        units = item.quantities.total_units(),
        "Added to cart"
    );
    Ok((StatusCode::CREATED, Json(line)))
}

/// PATCH /api/cart/items/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>, AppError> {
    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    let existing = carts
        .get_item(cart.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cart item {id} not found")))?;

    let detail = active_product_with_color(&state, existing.product_id, existing.color_id).await?;
    check_quantities(&detail, &body.quantities)?;

    let item = carts.update_item(cart.id, id, &body.quantities).await?;
    Ok(Json(item))
}

/// DELETE /api/cart/items/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode, AppError> {
    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    carts.remove_item(cart.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode, AppError> {
    let carts = CartRepository::new(state.pool());
    let cart = carts.get_or_create(&user.id).await?;
    carts.clear(cart.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use stitchworks_core::{ColorId, ProductId, ShirtSize, SizeVariantId};

    use super::*;
    use crate::models::{Product, ProductColor, SizeVariant};

    fn detail() -> ProductDetail {
        let now = Utc::now();
        ProductDetail {
            product: Product {
                id: ProductId::new(1),
                name: "Heavyweight Tee".to_string(),
                description: String::new(),
                category: "tees".to_string(),
                base_price_cents: 1800,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            colors: vec![ProductColor {
                id: ColorId::new(1),
                product_id: ProductId::new(1),
                name: "Black".to_string(),
                hex_code: "#000000".to_string(),
                front_image_url: None,
                back_image_url: None,
            }],
            sizes: vec![SizeVariant {
                id: SizeVariantId::new(1),
                product_id: ProductId::new(1),
                size: ShirtSize::M,
                price_cents: 1800,
                stock: 20,
            }],
        }
    }

    #[test]
    fn test_empty_quantities_rejected() {
        let err = check_quantities(&detail(), &SizeQuantities::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unoffered_size_rejected() {
        let quantities: SizeQuantities = [(ShirtSize::Xxxl, 2)].into_iter().collect();
        let err = check_quantities(&detail(), &quantities).unwrap_err();
        assert!(err.to_string().contains("3XL"));
    }

    #[test]
    fn test_offered_size_accepted() {
        let quantities: SizeQuantities = [(ShirtSize::M, 3)].into_iter().collect();
        assert!(check_quantities(&detail(), &quantities).is_ok());
    }
}
