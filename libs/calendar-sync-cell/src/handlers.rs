use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use tokio::sync::Mutex;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{ProviderSession, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentIntent, CancelAppointmentResponse, CancelQuery, CreateAppointmentResponse,
    UpcomingAppointment,
};
use crate::services::{
    merge_created, AppointmentSyncService, CalendarSettings, GoogleCalendarClient,
    SupabaseCalendarStore, SupabaseProviderTokens,
};

pub const PROVIDER_TOKEN_HEADER: &str = "x-provider-token";
pub const PROVIDER_REFRESH_TOKEN_HEADER: &str = "x-provider-refresh-token";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

pub struct CalendarSyncState {
    config: Arc<AppConfig>,
    supabase: Arc<SupabaseClient>,
    http: reqwest::Client,
    settings: CalendarSettings,
    calendar_creation: Arc<Mutex<()>>,
}

impl CalendarSyncState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(&config)),
            http: reqwest::Client::new(),
            settings: CalendarSettings::from_config(&config),
            calendar_creation: Arc::new(Mutex::new(())),
            config,
        }
    }

    /// A sync service acting with the caller's own credentials.
    pub fn service_for(&self, auth_token: &str, session: ProviderSession) -> AppointmentSyncService {
        let tokens = SupabaseProviderTokens::new(self.supabase.clone(), session);
        let calendar = GoogleCalendarClient::new(
            self.http.clone(),
            &self.config.google_calendar_base_url,
            Arc::new(tokens),
        );
        let store = SupabaseCalendarStore::new(self.supabase.clone(), auth_token);

        AppointmentSyncService::new(calendar, Arc::new(store), self.settings.clone())
            .with_creation_lock(self.calendar_creation.clone())
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Provider tokens the client forwards alongside its bearer token.
pub fn provider_session(headers: &HeaderMap, access_token: &str) -> ProviderSession {
    ProviderSession {
        access_token: access_token.to_string(),
        refresh_token: header_value(headers, REFRESH_TOKEN_HEADER),
        provider_token: header_value(headers, PROVIDER_TOKEN_HEADER),
        provider_refresh_token: header_value(headers, PROVIDER_REFRESH_TOKEN_HEADER),
    }
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<CalendarSyncState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<Json<Vec<UpcomingAppointment>>, AppError> {
    let service = state.service_for(auth.token(), provider_session(&headers, auth.token()));

    let events = service.upcoming_appointments(&user.id).await;
    debug!("Returning {} upcoming appointments", events.len());

    Ok(Json(events.into_iter().map(UpcomingAppointment::from).collect()))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<CalendarSyncState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
    Json(intent): Json<AppointmentIntent>,
) -> Result<(StatusCode, Json<CreateAppointmentResponse>), AppError> {
    let service = state.service_for(auth.token(), provider_session(&headers, auth.token()));

    let created = service.create_appointment(&user.id, intent).await?;

    let mut upcoming = service.upcoming_appointments(&user.id).await;
    merge_created(&mut upcoming, &created, Utc::now() + service.settings().upcoming_window);

    Ok((
        StatusCode::CREATED,
        Json(CreateAppointmentResponse {
            appointment: UpcomingAppointment::from(created),
            upcoming: upcoming.into_iter().map(UpcomingAppointment::from).collect(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<CalendarSyncState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(event_id): Path<String>,
    Query(query): Query<CancelQuery>,
    headers: HeaderMap,
) -> Result<Json<CancelAppointmentResponse>, AppError> {
    let service = state.service_for(auth.token(), provider_session(&headers, auth.token()));

    let performed = service
        .cancel_appointment(&user.id, &event_id, query.scope)
        .await?;

    Ok(Json(CancelAppointmentResponse {
        event_id,
        scope: query.scope,
        performed,
    }))
}
