use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, SessionGuardState};

pub fn session_guard_routes(config: Arc<AppConfig>) -> Router {
    let state = Arc::new(SessionGuardState::new(&config));

    Router::new()
        .route("/activity", post(handlers::record_activity))
        .route("/extend", post(handlers::extend_session))
        .route("/sign-out", post(handlers::sign_out))
        .route("/status", get(handlers::get_status))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
