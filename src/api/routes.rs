use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{get_stats, health_check, set_range, AppState};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    let stats_routes = Router::new()
        .route("/stats/{alias}", get(get_stats))
        .route("/stats/{alias}/range", put(set_range))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", stats_routes)
        .layer(CorsLayer::permissive())
}
