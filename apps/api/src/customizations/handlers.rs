use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Actor;
use crate::customizations::models::{CustomizationRow, GrantPermission, GrantRow};
use crate::customizations::overlay::{self, EffectiveDocument};
use crate::customizations::store::{self, SaveCustomization};
use crate::errors::AppError;
use crate::state::AppState;
use crate::templates::resolver;

/// POST /api/v1/customizations — insert, or update when `id` is supplied.
pub async fn handle_save(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<SaveCustomization>,
) -> Result<Json<CustomizationRow>, AppError> {
    Ok(Json(store::save(&state.db, &actor, req).await?))
}

/// GET /api/v1/customizations — the caller's own customizations.
pub async fn handle_list_mine(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<CustomizationRow>>, AppError> {
    Ok(Json(store::list_for_user(&state.db, actor.user_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// GET /api/v1/customizations/:id
pub async fn handle_get(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<CustomizationRow>, AppError> {
    let row = store::get(&state.db, id).await?;
    if !store::can_view(&state.db, &actor, &row, q.token.as_deref()).await? {
        return Err(AppError::Forbidden);
    }
    Ok(Json(row))
}

/// DELETE /api/v1/customizations/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    store::delete(&state.db, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share_token: String,
}

/// POST /api/v1/customizations/:id/share
pub async fn handle_share(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareResponse>, AppError> {
    let share_token = store::share(&state.db, &actor, id).await?;
    Ok(Json(ShareResponse { share_token }))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub grantee_user_id: Uuid,
    pub permission: GrantPermission,
}

/// POST /api/v1/customizations/:id/grants
pub async fn handle_grant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(req): Json<GrantRequest>,
) -> Result<Json<GrantRow>, AppError> {
    Ok(Json(
        store::grant(&state.db, &actor, id, req.grantee_user_id, req.permission).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct EffectiveQuery {
    pub customization_id: Option<Uuid>,
    pub token: Option<String>,
}

/// GET /api/v1/templates/:id/effective
///
/// Resolves the inheritance chain, then applies the caller's customization
/// (if any). Applying a customization bumps its usage counters.
pub async fn handle_effective(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<Uuid>,
    Query(q): Query<EffectiveQuery>,
) -> Result<Json<EffectiveDocument>, AppError> {
    let resolved = resolver::resolve(&state.db, template_id).await?;

    let doc = match q.customization_id {
        None => overlay::apply(&resolved, None, &Default::default())?,
        Some(customization_id) => {
            let row = store::get(&state.db, customization_id).await?;
            if row.template_id != template_id {
                return Err(AppError::Mismatch(format!(
                    "Customization {customization_id} targets template {}, not {template_id}",
                    row.template_id
                )));
            }
            if !store::can_view(&state.db, &actor, &row, q.token.as_deref()).await? {
                return Err(AppError::Forbidden);
            }
            let doc = overlay::apply(&resolved, Some(row.id), &row.patch()?)?;
            store::mark_applied(&state.db, row.id).await?;
            doc
        }
    };
    Ok(Json(doc))
}
