use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::state::AppState;
use crate::templates::models::{TemplateCreate, TemplateFilters, TemplateRow, TemplateUpdate};
use crate::templates::resolver::{self, ResolvedTemplate};
use crate::templates::store::{self, BulkResult, DeleteOptions};

/// POST /api/v1/templates
pub async fn handle_create(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<TemplateCreate>,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    let row = store::create(&state.db, &actor, req).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/templates
pub async fn handle_list(
    State(state): State<AppState>,
    Query(filters): Query<TemplateFilters>,
) -> Result<Json<Vec<TemplateRow>>, AppError> {
    Ok(Json(store::list(&state.db, &filters).await?))
}

/// GET /api/v1/templates/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TemplateRow>, AppError> {
    Ok(Json(store::get(&state.db, id).await?))
}

/// PATCH /api/v1/templates/:id
pub async fn handle_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(patch): Json<TemplateUpdate>,
) -> Result<Json<TemplateRow>, AppError> {
    Ok(Json(store::update(&state.db, &actor, id, patch).await?))
}

/// DELETE /api/v1/templates/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(opts): Query<DeleteOptions>,
) -> Result<StatusCode, AppError> {
    store::delete(&state.db, &actor, id, opts).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/templates/:id/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResolvedTemplate>, AppError> {
    Ok(Json(resolver::resolve(&state.db, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct DuplicateRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /api/v1/templates/:id/duplicate
pub async fn handle_duplicate(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<DuplicateRequest>,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    let row = store::duplicate(&state.db, &actor, id, req.name).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub ids: Vec<Uuid>,
    pub patch: TemplateUpdate,
}

/// POST /api/v1/templates/bulk/update
pub async fn handle_bulk_update(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<BulkResult>, AppError> {
    Ok(Json(
        store::bulk_update(&state.db, &actor, &req.ids, &req.patch).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub hard: bool,
    #[serde(default)]
    pub transfer_dependencies_to: Option<Uuid>,
}

/// POST /api/v1/templates/bulk/delete
pub async fn handle_bulk_delete(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkResult>, AppError> {
    let opts = DeleteOptions {
        hard: req.hard,
        transfer_dependencies_to: req.transfer_dependencies_to,
    };
    Ok(Json(
        store::bulk_delete(&state.db, &actor, &req.ids, &opts).await?,
    ))
}
