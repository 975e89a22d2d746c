use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, CalendarSyncState};

pub fn calendar_sync_routes(config: Arc<AppConfig>) -> Router {
    let state = Arc::new(CalendarSyncState::new(config.clone()));

    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/{event_id}", delete(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
