use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use tokio::time::Instant;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ActivityRequest, SessionGuardError, SessionStatusResponse};
use crate::services::{SessionGuard, SessionGuardRegistry};

pub struct SessionGuardState {
    pub registry: SessionGuardRegistry,
}

impl SessionGuardState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            registry: SessionGuardRegistry::new(config),
        }
    }
}

async fn status_of(guard: &SessionGuard) -> Result<Json<SessionStatusResponse>, AppError> {
    let snapshot = guard.status().await?;
    Ok(Json(SessionStatusResponse::from_snapshot(&snapshot, Instant::now())))
}

#[axum::debug_handler]
pub async fn record_activity(
    State(state): State<Arc<SessionGuardState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let guard = state.registry.guard_for(&user.id, auth.token()).await?;
    guard.record_activity(request.kind).await?;

    status_of(&guard).await
}

#[axum::debug_handler]
pub async fn extend_session(
    State(state): State<Arc<SessionGuardState>>,
    Extension(user): Extension<User>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let guard = state
        .registry
        .existing(&user.id)
        .await
        .ok_or(SessionGuardError::NotAuthenticated)?;
    guard.extend().await?;

    status_of(&guard).await
}

#[axum::debug_handler]
pub async fn sign_out(
    State(state): State<Arc<SessionGuardState>>,
    Extension(user): Extension<User>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let guard = state
        .registry
        .existing(&user.id)
        .await
        .ok_or(SessionGuardError::NotAuthenticated)?;
    guard.sign_out().await?;

    Ok(Json(SessionStatusResponse::from_snapshot(&guard.snapshot(), Instant::now())))
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<Arc<SessionGuardState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let guard = state.registry.guard_for(&user.id, auth.token()).await?;

    status_of(&guard).await
}
