//! Saved customer designs. Every route is scoped to the signed-in owner.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use stitchworks_core::DesignId;
use tracing::{info, instrument};

use crate::db::{DesignRepository, DesignTemplateRepository};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::{Design, DesignInput};
use crate::state::AppState;

use super::products::active_product_with_color;

/// Create the design routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/designs", get(index).post(create))
        .route("/designs/{id}", get(show).put(update).delete(destroy))
}

/// Validate a design against the catalog before saving it.
async fn check_input(state: &AppState, input: &DesignInput) -> Result<(), AppError> {
    input.validate().map_err(AppError::BadRequest)?;
    active_product_with_color(state, input.product_id, input.color_id).await?;

    if let Some(template_id) = input.template_id {
        let published = DesignTemplateRepository::new(state.pool())
            .get(template_id)
            .await?
            .is_some_and(|t| t.is_published);
        if !published {
            return Err(AppError::BadRequest(format!(
                "Design template {template_id} is not available"
            )));
        }
    }
    Ok(())
}

/// GET /api/designs
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Design>>, AppError> {
    let designs = DesignRepository::new(state.pool())
        .list_for_user(&user.id)
        .await?;
    Ok(Json(designs))
}

/// POST /api/designs
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<DesignInput>,
) -> Result<(StatusCode, Json<Design>), AppError> {
    check_input(&state, &input).await?;
    let design = DesignRepository::new(state.pool())
        .create(&user.id, &input)
        .await?;
    info!(design_id = %design.id, "Design saved");
    Ok((StatusCode::CREATED, Json(design)))
}

/// GET /api/designs/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<DesignId>,
) -> Result<Json<Design>, AppError> {
    DesignRepository::new(state.pool())
        .get_for_user(id, &user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Design {id} not found")))
}

/// PUT /api/designs/{id}
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<DesignId>,
    Json(input): Json<DesignInput>,
) -> Result<Json<Design>, AppError> {
    check_input(&state, &input).await?;
    let design = DesignRepository::new(state.pool())
        .update(id, &user.id, &input)
        .await?;
    Ok(Json(design))
}

/// DELETE /api/designs/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn destroy(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<DesignId>,
) -> Result<StatusCode, AppError> {
    DesignRepository::new(state.pool())
        .delete(id, &user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
