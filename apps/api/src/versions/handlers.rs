use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::state::AppState;
use crate::templates::models::TemplateRow;
use crate::templates::store as templates;
use crate::versions::diff::{self, VersionDiff};
use crate::versions::ledger;
use crate::versions::models::VersionRow;

/// GET /api/v1/templates/:id/versions
pub async fn handle_list(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Vec<VersionRow>>, AppError> {
    templates::get(&state.db, template_id).await?;
    Ok(Json(ledger::list(&state.db, template_id).await?))
}

/// GET /api/v1/versions/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<VersionRow>, AppError> {
    Ok(Json(ledger::get(&state.db, version_id).await?))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default = "default_true")]
    pub unpublish_others: bool,
}

/// POST /api/v1/versions/:id/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    actor: Actor,
    Path(version_id): Path<Uuid>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<VersionRow>, AppError> {
    actor.require_admin()?;
    Ok(Json(
        ledger::publish(&state.db, version_id, req.unpublish_others).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    pub version_id: Uuid,
    #[serde(default = "default_true")]
    pub create_backup: bool,
}

/// POST /api/v1/templates/:id/revert
pub async fn handle_revert(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<Uuid>,
    Json(req): Json<RevertRequest>,
) -> Result<Json<TemplateRow>, AppError> {
    actor.require_admin()?;
    Ok(Json(
        ledger::revert_to(&state.db, template_id, req.version_id, req.create_backup).await?,
    ))
}

/// GET /api/v1/versions/:from/compare/:to
pub async fn handle_compare(
    State(state): State<AppState>,
    Path((from_id, to_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VersionDiff>, AppError> {
    let from = ledger::get(&state.db, from_id).await?;
    let to = ledger::get(&state.db, to_id).await?;
    if from.template_id != to.template_id {
        return Err(AppError::Mismatch(format!(
            "Versions {from_id} and {to_id} belong to different templates"
        )));
    }
    Ok(Json(diff::compare(&from, &to)?))
}
