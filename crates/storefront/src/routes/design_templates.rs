//! Published design templates customers can start a design from.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use stitchworks_core::DesignTemplateId;
use tracing::instrument;

use crate::db::DesignTemplateRepository;
use crate::error::AppError;
use crate::models::DesignTemplate;
use crate::state::AppState;

/// Create the public template routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/design-templates", get(index))
        .route("/design-templates/{id}", get(show))
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub category: Option<String>,
}

/// GET /api/design-templates
#[instrument(skip(state))]
async fn index(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Vec<DesignTemplate>>, AppError> {
    let category = query.category.as_deref().filter(|c| !c.trim().is_empty());
    let templates = DesignTemplateRepository::new(state.pool())
        .list_published(category)
        .await?;
    Ok(Json(templates))
}

/// GET /api/design-templates/{id}
///
/// Unpublished templates are hidden from customers.
#[instrument(skip(state))]
async fn show(
    State(state): State<AppState>,
    Path(id): Path<DesignTemplateId>,
) -> Result<Json<DesignTemplate>, AppError> {
    DesignTemplateRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|t| t.is_published)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Design template {id} not found")))
}
