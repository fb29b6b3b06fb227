use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{audit, brands, handlers, middleware::metrics_middleware, misfits};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Brands
        .route("/brands", get(brands::list_brands))
        // Misfits
        .route("/misfits", get(misfits::get_feed))
        .route("/misfits/reconcile", post(misfits::reconcile))
        .route("/misfits/bulk", post(misfits::bulk))
        .route("/misfits/{id}/dispute", post(misfits::dispute))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
