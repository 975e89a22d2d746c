use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::jwt::token_expiry;

use crate::models::{SessionGuardError, SessionGuardSettings, SessionNotice, LOGIN_PATH};
use crate::services::collaborators::{SessionNotifier, SupabaseSessionAuth};
use crate::services::guard::SessionGuard;

const NOTICE_CAPACITY: usize = 64;
// Retention for revoked tokens that carry no `exp` claim.
const OPAQUE_TOKEN_RETENTION_SECS: u64 = 24 * 60 * 60;

struct RegisteredGuard {
    guard_id: Uuid,
    access_token: String,
    guard: SessionGuard,
    notices: broadcast::Sender<SessionNotice>,
}

#[derive(Default)]
struct Sessions {
    guards: HashMap<String, RegisteredGuard>,
    // Tokens whose session expired, keyed to their own expiry (unix secs).
    // They cannot start a new guard while they would still authenticate.
    revoked_tokens: HashMap<String, u64>,
}

impl Sessions {
    fn revoke(&mut self, access_token: String) {
        let now = Utc::now().timestamp().max(0) as u64;
        let expires_at =
            token_expiry(&access_token).unwrap_or(now + OPAQUE_TOKEN_RETENTION_SECS);

        self.revoked_tokens.insert(access_token, expires_at);
        self.revoked_tokens.retain(|_, expires_at| *expires_at > now);
    }

    fn retire(&mut self, user_id: &str) {
        if let Some(entry) = self.guards.remove(user_id) {
            self.revoke(entry.access_token);
            entry.guard.shutdown();
        }
    }
}

/// Keeps one guard per signed-in user. An expired guard removes itself and
/// revokes the token it was created for, so only a fresh sign-in starts a
/// new guard.
pub struct SessionGuardRegistry {
    settings: SessionGuardSettings,
    supabase: Arc<SupabaseClient>,
    sessions: Arc<RwLock<Sessions>>,
}

impl SessionGuardRegistry {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_settings(config, SessionGuardSettings::from_config(config))
    }

    pub fn with_settings(config: &AppConfig, settings: SessionGuardSettings) -> Self {
        Self {
            settings,
            supabase: Arc::new(SupabaseClient::new(config)),
            sessions: Arc::new(RwLock::new(Sessions::default())),
        }
    }

    /// Returns the user's running guard, creating and authenticating one on
    /// first use.
    pub async fn guard_for(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<SessionGuard, SessionGuardError> {
        if let Some(guard) = self.existing(user_id).await {
            return Ok(guard);
        }

        let mut sessions = self.sessions.write().await;
        if sessions.revoked_tokens.contains_key(access_token) {
            debug!("Refusing guard for revoked token of user {}", user_id);
            return Err(SessionGuardError::NotAuthenticated);
        }
        if let Some(entry) = sessions.guards.get(user_id) {
            if entry.guard.state().is_authenticated() {
                return Ok(entry.guard.clone());
            }
            if entry.access_token == access_token {
                return Err(SessionGuardError::NotAuthenticated);
            }
            // Expired guard whose cleanup has not run yet.
            sessions.retire(user_id);
        }

        let guard_id = Uuid::new_v4();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let notifier = RegistryNotifier {
            user_id: user_id.to_string(),
            guard_id,
            notices: notices.clone(),
            sessions: Arc::downgrade(&self.sessions),
        };
        let auth = SupabaseSessionAuth::new(self.supabase.clone(), access_token);

        let guard = SessionGuard::spawn(self.settings, Arc::new(auth), Arc::new(notifier));
        guard.authenticate().await?;

        info!("Started session guard {} for user {}", guard_id, user_id);
        sessions.guards.insert(
            user_id.to_string(),
            RegisteredGuard {
                guard_id,
                access_token: access_token.to_string(),
                guard: guard.clone(),
                notices,
            },
        );

        Ok(guard)
    }

    /// The user's guard if it still holds an authenticated session.
    pub async fn existing(&self, user_id: &str) -> Option<SessionGuard> {
        self.sessions
            .read()
            .await
            .guards
            .get(user_id)
            .filter(|entry| entry.guard.state().is_authenticated())
            .map(|entry| entry.guard.clone())
    }

    pub async fn subscribe(&self, user_id: &str) -> Option<broadcast::Receiver<SessionNotice>> {
        self.sessions
            .read()
            .await
            .guards
            .get(user_id)
            .map(|entry| entry.notices.subscribe())
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.guards.len()
    }

    /// Revoked tokens still held; entries are dropped once the token expires.
    pub async fn revoked_tokens(&self) -> usize {
        self.sessions.read().await.revoked_tokens.len()
    }
}

struct RegistryNotifier {
    user_id: String,
    guard_id: Uuid,
    notices: broadcast::Sender<SessionNotice>,
    sessions: Weak<RwLock<Sessions>>,
}

impl SessionNotifier for RegistryNotifier {
    fn clear_cached_state(&self) {
        let Some(sessions) = self.sessions.upgrade() else {
            return;
        };
        let user_id = self.user_id.clone();
        let guard_id = self.guard_id;

        // The guard loop must not wait on the registry lock.
        tokio::spawn(async move {
            let mut sessions = sessions.write().await;
            let is_current = sessions
                .guards
                .get(&user_id)
                .map(|entry| entry.guard_id == guard_id)
                .unwrap_or(false);

            if is_current {
                sessions.retire(&user_id);
                debug!("Cleared session guard {} for user {}", guard_id, user_id);
            }
        });
    }

    fn redirect_to_login(&self) {
        self.notify(SessionNotice::Redirect {
            location: LOGIN_PATH.to_string(),
        });
    }

    fn notify(&self, notice: SessionNotice) {
        if let SessionNotice::Expired { message, .. } = &notice {
            warn!("User {}: {}", self.user_id, message);
        }
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }
}
