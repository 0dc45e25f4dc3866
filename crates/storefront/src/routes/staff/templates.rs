//! Design template management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use stitchworks_core::{DesignTemplateId, Permission};
use tracing::{info, instrument};

use crate::db::DesignTemplateRepository;
use crate::error::AppError;
use crate::middleware::{RequireStaff, require_permission};
use crate::models::{DesignTemplate, DesignTemplateInput};
use crate::state::AppState;

/// Create the template management routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/design-templates", get(index).post(create))
        .route("/design-templates/{id}", put(update).delete(destroy))
        .route("/design-templates/{id}/publish", post(publish))
}

/// Body for the publish toggle; omit `published` to publish.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_published")]
    pub published: bool,
}

const fn default_published() -> bool {
    true
}

/// GET /api/staff/design-templates
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
) -> Result<Json<Vec<DesignTemplate>>, AppError> {
    require_permission(&user, Permission::ManageTemplates)?;
    Ok(Json(
        DesignTemplateRepository::new(state.pool()).list_all().await?,
    ))
}

/// POST /api/staff/design-templates
///
/// New templates start unpublished.
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn create(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Json(input): Json<DesignTemplateInput>,
) -> Result<(StatusCode, Json<DesignTemplate>), AppError> {
    require_permission(&user, Permission::ManageTemplates)?;
    input.validate().map_err(AppError::BadRequest)?;

    let template = DesignTemplateRepository::new(state.pool())
        .create(&input, &user.id)
        .await?;
    info!(template_id = %template.id, "Design template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/staff/design-templates/{id}
#[instrument(skip(state, user, input), fields(staff = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<DesignTemplateId>,
    Json(input): Json<DesignTemplateInput>,
) -> Result<Json<DesignTemplate>, AppError> {
    require_permission(&user, Permission::ManageTemplates)?;
    input.validate().map_err(AppError::BadRequest)?;

    Ok(Json(
        DesignTemplateRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

/// POST /api/staff/design-templates/{id}/publish
#[instrument(skip(state, user, body), fields(staff = %user.id))]
async fn publish(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<DesignTemplateId>,
    Json(body): Json<PublishRequest>,
) -> Result<Json<DesignTemplate>, AppError> {
    require_permission(&user, Permission::ManageTemplates)?;
    let template = DesignTemplateRepository::new(state.pool())
        .set_published(id, body.published)
        .await?;
    info!(template_id = %id, published = body.published, "Design template visibility changed");
    Ok(Json(template))
}

/// DELETE /api/staff/design-templates/{id}
#[instrument(skip(state, user), fields(staff = %user.id))]
async fn destroy(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    Path(id): Path<DesignTemplateId>,
) -> Result<StatusCode, AppError> {
    require_permission(&user, Permission::ManageTemplates)?;
    DesignTemplateRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
