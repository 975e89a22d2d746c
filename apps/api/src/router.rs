use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use calendar_sync_cell::router::calendar_sync_routes;
use session_guard_cell::router::session_guard_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Neurova API is running!" }))
        .nest("/session", session_guard_routes(state.clone()))
        .nest("/appointments", calendar_sync_routes(state))
}
