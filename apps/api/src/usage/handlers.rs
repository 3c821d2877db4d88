use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::AppError;
use crate::state::AppState;
use crate::usage::analytics::{
    self, EngagementReport, FunnelReport, PerformanceReport, TimeRange,
};
use crate::usage::models::{RecordUsage, UsageEventRow};
use crate::usage::recorder;

/// POST /api/v1/usage
pub async fn handle_record(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RecordUsage>,
) -> Result<(StatusCode, Json<UsageEventRow>), AppError> {
    let row = recorder::record(&state.db, &actor, req).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/templates/:id/analytics/funnel
pub async fn handle_funnel(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Query(range): Query<TimeRange>,
) -> Result<Json<FunnelReport>, AppError> {
    Ok(Json(analytics::funnel(&state.db, template_id, &range).await?))
}

/// GET /api/v1/templates/:id/analytics/engagement
pub async fn handle_engagement(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Query(range): Query<TimeRange>,
) -> Result<Json<EngagementReport>, AppError> {
    Ok(Json(
        analytics::engagement(&state.db, template_id, &range).await?,
    ))
}

/// GET /api/v1/templates/:id/analytics/performance
pub async fn handle_performance(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Query(range): Query<TimeRange>,
) -> Result<Json<PerformanceReport>, AppError> {
    Ok(Json(
        analytics::performance(&state.db, template_id, &range).await?,
    ))
}

/// POST /api/v1/templates/:id/analytics/refresh — admin-only recompute of the
/// cached conversion/completion/export rates.
pub async fn handle_refresh_metrics(
    State(state): State<AppState>,
    actor: Actor,
    Path(template_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    actor.require_admin()?;
    analytics::refresh_metrics(&state.db, template_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
