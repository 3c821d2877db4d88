pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::customizations::handlers as customizations;
use crate::state::AppState;
use crate::templates::handlers as templates;
use crate::usage::handlers as usage;
use crate::versions::handlers as versions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Template store
        .route(
            "/api/v1/templates",
            get(templates::handle_list).post(templates::handle_create),
        )
        .route(
            "/api/v1/templates/:id",
            get(templates::handle_get)
                .patch(templates::handle_update)
                .delete(templates::handle_delete),
        )
        .route(
            "/api/v1/templates/:id/resolve",
            get(templates::handle_resolve),
        )
        .route(
            "/api/v1/templates/:id/duplicate",
            post(templates::handle_duplicate),
        )
        .route(
            "/api/v1/templates/bulk/update",
            post(templates::handle_bulk_update),
        )
        .route(
            "/api/v1/templates/bulk/delete",
            post(templates::handle_bulk_delete),
        )
        // Version ledger
        .route(
            "/api/v1/templates/:id/versions",
            get(versions::handle_list),
        )
        .route("/api/v1/templates/:id/revert", post(versions::handle_revert))
        .route("/api/v1/versions/:id", get(versions::handle_get))
        .route("/api/v1/versions/:id/publish", post(versions::handle_publish))
        .route(
            "/api/v1/versions/:from/compare/:to",
            get(versions::handle_compare),
        )
        // Customizations
        .route(
            "/api/v1/customizations",
            get(customizations::handle_list_mine).post(customizations::handle_save),
        )
        .route(
            "/api/v1/customizations/:id",
            get(customizations::handle_get).delete(customizations::handle_delete),
        )
        .route(
            "/api/v1/customizations/:id/share",
            post(customizations::handle_share),
        )
        .route(
            "/api/v1/customizations/:id/grants",
            post(customizations::handle_grant),
        )
        .route(
            "/api/v1/templates/:id/effective",
            get(customizations::handle_effective),
        )
        // Usage & analytics
        .route("/api/v1/usage", post(usage::handle_record))
        .route(
            "/api/v1/templates/:id/analytics/funnel",
            get(usage::handle_funnel),
        )
        .route(
            "/api/v1/templates/:id/analytics/engagement",
            get(usage::handle_engagement),
        )
        .route(
            "/api/v1/templates/:id/analytics/performance",
            get(usage::handle_performance),
        )
        .route(
            "/api/v1/templates/:id/analytics/refresh",
            post(usage::handle_refresh_metrics),
        )
        .with_state(state)
}
