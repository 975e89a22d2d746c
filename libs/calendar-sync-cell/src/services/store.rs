use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error};

use shared_database::supabase::SupabaseClient;

use crate::models::{CalendarInfo, CalendarSyncError, TherapistCalendar};

/// Where each therapist's calendar handle is persisted.
#[async_trait]
pub trait CalendarHandleStore: Send + Sync {
    /// The therapist profile owned by `user_id`, with its calendar handle if
    /// one was saved.
    async fn therapist_calendar(&self, user_id: &str) -> Result<TherapistCalendar, CalendarSyncError>;

    async fn save_calendar_info(
        &self,
        therapist_id: &str,
        info: &CalendarInfo,
    ) -> Result<(), CalendarSyncError>;
}

/// Reads and writes `therapists.calendar_info` with the caller's token, so
/// row level security applies.
pub struct SupabaseCalendarStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseCalendarStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }
}

fn store_error(action: &str, err: anyhow::Error) -> CalendarSyncError {
    error!("Failed to {}: {}", action, err);
    CalendarSyncError::Store(format!("Failed to {}: {}", action, err))
}

#[async_trait]
impl CalendarHandleStore for SupabaseCalendarStore {
    async fn therapist_calendar(&self, user_id: &str) -> Result<TherapistCalendar, CalendarSyncError> {
        let path = format!(
            "/rest/v1/therapists?user_id=eq.{}&select=id,calendar_info",
            urlencoding::encode(user_id)
        );

        let rows: Vec<TherapistCalendar> = self
            .supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await
            .map_err(|e| store_error("load therapist profile", e))?;

        rows.into_iter().next().ok_or(CalendarSyncError::TherapistNotFound)
    }

    async fn save_calendar_info(
        &self,
        therapist_id: &str,
        info: &CalendarInfo,
    ) -> Result<(), CalendarSyncError> {
        debug!("Saving calendar {} for therapist {}", info.id, therapist_id);

        let path = format!("/rest/v1/therapists?id=eq.{}", urlencoding::encode(therapist_id));

        self.supabase
            .execute(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(json!({ "calendar_info": info })),
            )
            .await
            .map_err(|e| store_error("save calendar info", e))
    }
}
