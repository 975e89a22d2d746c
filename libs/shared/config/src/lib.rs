use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_GOOGLE_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub google_calendar_base_url: String,
    pub calendar_time_zone: String,
    pub session_timeout_minutes: u64,
    pub session_warning_minutes: u64,
    pub upcoming_window_days: i64,
    pub api_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            google_calendar_base_url: DEFAULT_GOOGLE_CALENDAR_BASE_URL.to_string(),
            calendar_time_zone: "UTC".to_string(),
            session_timeout_minutes: 22,
            session_warning_minutes: 2,
            upcoming_window_days: 7,
            api_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            google_calendar_base_url: env::var("GOOGLE_CALENDAR_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("GOOGLE_CALENDAR_BASE_URL not set, using default");
                    defaults.google_calendar_base_url.clone()
                }),
            calendar_time_zone: env::var("CALENDAR_TIME_ZONE")
                .unwrap_or_else(|_| defaults.calendar_time_zone.clone()),
            session_timeout_minutes: parse_or("SESSION_TIMEOUT_MINUTES", defaults.session_timeout_minutes),
            session_warning_minutes: parse_or("SESSION_WARNING_MINUTES", defaults.session_warning_minutes),
            upcoming_window_days: parse_or("UPCOMING_WINDOW_DAYS", defaults.upcoming_window_days),
            api_port: parse_or("API_PORT", defaults.api_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.session_warning_minutes >= config.session_timeout_minutes {
            warn!(
                "SESSION_WARNING_MINUTES ({}) is not below SESSION_TIMEOUT_MINUTES ({})",
                config.session_warning_minutes, config.session_timeout_minutes
            );
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        self.is_configured() && !self.google_calendar_base_url.is_empty()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
