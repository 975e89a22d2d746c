use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use shared_config::AppConfig;
use shared_models::error::AppError;

pub const LOGIN_PATH: &str = "/auth/login";
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

// ==============================================================================
// STATE MACHINE VOCABULARY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No authenticated session; no timers are owned.
    SignedOut,
    Active,
    Warning,
    /// Terminal for this guard instance until authentication happens again.
    Expired,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Warning)
    }
}

/// Interaction events that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    KeyPress,
    Scroll,
    TouchStart,
    Click,
    KeyDown,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
        ActivityKind::KeyDown,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Authenticated,
    Unauthenticated,
    Activity(ActivityKind),
    Extend,
    SignOut,
    WarningDeadline { epoch: u64 },
    HardTimeout { epoch: u64 },
    CountdownTick { epoch: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    CountdownElapsed,
    HardTimeout,
    SignedOut,
}

impl ExpiryReason {
    pub fn message(&self) -> &'static str {
        match self {
            ExpiryReason::CountdownElapsed | ExpiryReason::HardTimeout => {
                "Session expired for security. Please sign in again."
            }
            ExpiryReason::SignedOut => "You have been signed out.",
        }
    }
}

/// Side effects requested by a transition, applied in order by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEffect {
    CancelAll,
    ArmDeadlines {
        epoch: u64,
        warning_in: Duration,
        timeout_in: Duration,
    },
    StartCountdown { epoch: u64 },
    Notify(SessionNotice),
    Expire(ExpiryReason),
}

/// User-facing notifications emitted while the guard runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    WarningShown { seconds_left: u64 },
    Countdown { seconds_left: u64 },
    Extended,
    Expired { reason: ExpiryReason, message: String },
    Redirect { location: String },
}

// ==============================================================================
// SETTINGS & SNAPSHOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGuardSettings {
    pub timeout: Duration,
    pub warning_lead: Duration,
}

impl Default for SessionGuardSettings {
    fn default() -> Self {
        Self::from_minutes(22, 2)
    }
}

impl SessionGuardSettings {
    pub fn new(timeout: Duration, warning_lead: Duration) -> Self {
        Self { timeout, warning_lead }
    }

    pub fn from_minutes(timeout_minutes: u64, warning_minutes: u64) -> Self {
        Self::new(
            Duration::from_secs(timeout_minutes * 60),
            Duration::from_secs(warning_minutes * 60),
        )
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::from_minutes(config.session_timeout_minutes, config.session_warning_minutes)
    }

    /// Delay between the last activity and the warning. A warning lead that
    /// is not below the timeout collapses to an immediate warning.
    pub fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning_lead)
    }

    pub fn is_consistent(&self) -> bool {
        self.warning_lead < self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub last_activity_at: Option<Instant>,
    pub countdown_seconds: u64,
    pub settings: SessionGuardSettings,
}

impl SessionSnapshot {
    /// Time left before the hard timeout, measured against the full timeout.
    pub fn remaining_time(&self, now: Instant) -> Duration {
        remaining_time(self.state, self.last_activity_at, self.settings.timeout, now)
    }
}

/// Whole seconds left of `timeout` since `last_activity_at`; zero for any
/// state without an authenticated session.
pub fn remaining_time(
    state: SessionState,
    last_activity_at: Option<Instant>,
    timeout: Duration,
    now: Instant,
) -> Duration {
    if !state.is_authenticated() {
        return Duration::ZERO;
    }

    match last_activity_at {
        Some(last) => {
            let elapsed = now.saturating_duration_since(last);
            Duration::from_secs(timeout.saturating_sub(elapsed).as_secs())
        }
        None => Duration::ZERO,
    }
}

/// Renders seconds as `m:ss` for the warning dialog.
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// ==============================================================================
// HTTP DTOs
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub kind: ActivityKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub state: SessionState,
    pub remaining_seconds: u64,
    pub countdown_seconds: u64,
    pub countdown_display: String,
    pub redirect: Option<String>,
}

impl SessionStatusResponse {
    pub fn from_snapshot(snapshot: &SessionSnapshot, now: Instant) -> Self {
        let redirect = match snapshot.state {
            SessionState::Expired | SessionState::SignedOut => Some(LOGIN_PATH.to_string()),
            _ => None,
        };

        Self {
            state: snapshot.state,
            remaining_seconds: snapshot.remaining_time(now).as_secs(),
            countdown_seconds: snapshot.countdown_seconds,
            countdown_display: format_countdown(snapshot.countdown_seconds),
            redirect,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionGuardError {
    #[error("No authenticated session")]
    NotAuthenticated,

    #[error("Session guard has stopped")]
    GuardStopped,
}

impl From<SessionGuardError> for AppError {
    fn from(err: SessionGuardError) -> Self {
        match err {
            SessionGuardError::NotAuthenticated => AppError::Auth(err.to_string()),
            SessionGuardError::GuardStopped => AppError::Internal(err.to_string()),
        }
    }
}
