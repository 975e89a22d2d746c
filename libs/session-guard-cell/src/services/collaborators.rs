use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared_database::supabase::SupabaseClient;

use crate::models::SessionNotice;

/// Ends the session with the auth backend.
#[async_trait]
pub trait SessionAuth: Send + Sync {
    async fn sign_out(&self) -> Result<()>;
}

/// Surface the guard reports to: cached state, navigation and notices.
pub trait SessionNotifier: Send + Sync {
    fn clear_cached_state(&self);
    fn redirect_to_login(&self);
    fn notify(&self, notice: SessionNotice);
}

pub struct SupabaseSessionAuth {
    supabase: Arc<SupabaseClient>,
    access_token: String,
}

impl SupabaseSessionAuth {
    pub fn new(supabase: Arc<SupabaseClient>, access_token: impl Into<String>) -> Self {
        Self {
            supabase,
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl SessionAuth for SupabaseSessionAuth {
    async fn sign_out(&self) -> Result<()> {
        self.supabase.sign_out(&self.access_token).await
    }
}
