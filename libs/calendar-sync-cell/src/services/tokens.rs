use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use shared_database::supabase::SupabaseClient;
use shared_models::auth::ProviderSession;

use crate::models::CalendarSyncError;

/// Supplies the bearer token for calendar provider calls.
#[async_trait]
pub trait ProviderTokenSource: Send + Sync {
    /// The cached provider access token.
    async fn access_token(&self) -> Result<String, CalendarSyncError>;

    /// Obtains a fresh provider access token and caches it.
    async fn refresh_access_token(&self) -> Result<String, CalendarSyncError>;
}

/// Token source backed by the hosted auth backend's session refresh.
pub struct SupabaseProviderTokens {
    supabase: Arc<SupabaseClient>,
    session: Mutex<ProviderSession>,
}

impl SupabaseProviderTokens {
    pub fn new(supabase: Arc<SupabaseClient>, session: ProviderSession) -> Self {
        Self {
            supabase,
            session: Mutex::new(session),
        }
    }

    /// Current session, including any tokens rotated by a refresh.
    pub async fn session(&self) -> ProviderSession {
        self.session.lock().await.clone()
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[async_trait]
impl ProviderTokenSource for SupabaseProviderTokens {
    async fn access_token(&self) -> Result<String, CalendarSyncError> {
        let session = self.session.lock().await;

        non_empty(session.provider_token.clone()).ok_or_else(|| {
            CalendarSyncError::ReauthenticationRequired(
                "Google access token not found. Please re-authenticate with Google.".to_string(),
            )
        })
    }

    async fn refresh_access_token(&self) -> Result<String, CalendarSyncError> {
        let mut session = self.session.lock().await;

        let refresh_token = non_empty(session.refresh_token.clone()).ok_or_else(|| {
            CalendarSyncError::ReauthenticationRequired(
                "No active session found. Please re-authenticate with Google.".to_string(),
            )
        })?;

        if !session.has_provider_refresh_token() {
            return Err(CalendarSyncError::ReauthenticationRequired(
                "No refresh token available. Please re-authenticate with Google.".to_string(),
            ));
        }

        let refreshed = self
            .supabase
            .refresh_session(&refresh_token)
            .await
            .map_err(|e| {
                error!("Token refresh failed: {}", e);
                CalendarSyncError::reauthenticate()
            })?;

        let provider_token = non_empty(refreshed.provider_token).ok_or_else(|| {
            warn!("Failed to get new access token after refresh");
            CalendarSyncError::reauthenticate()
        })?;

        session.access_token = refreshed.access_token;
        if let Some(rotated) = non_empty(refreshed.refresh_token) {
            session.refresh_token = Some(rotated);
        }
        if let Some(rotated) = non_empty(refreshed.provider_refresh_token) {
            session.provider_refresh_token = Some(rotated);
        }
        session.provider_token = Some(provider_token.clone());

        info!("Refreshed provider access token");
        Ok(provider_token)
    }
}
