//! # Calendar Sync Cell
//!
//! Mirrors a therapist's appointments into a dedicated calendar on the
//! external calendar provider. Each therapist gets one calendar, created on
//! first use and remembered in their profile.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                 Calendar Sync Cell                  |
//! +-----------------------------------------------------+
//! |  handlers.rs      |  HTTP endpoint handlers         |
//! |  router.rs        |  Route definitions              |
//! |  models.rs        |  Provider events, intents       |
//! |  services/                                          |
//! |    google.rs      |  Provider REST client           |
//! |    tokens.rs      |  Provider token refresh         |
//! |    store.rs       |  Calendar handle persistence    |
//! |    recurrence.rs  |  RRULE construction             |
//! |    sync.rs        |  Create, list and cancel        |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /appointments/upcoming` - Appointments in the upcoming window
//! - `POST /appointments` - Create an appointment with a video meeting
//! - `DELETE /appointments/{event_id}?scope=single|series` - Cancel
//!
//! Provider credentials travel in `X-Provider-Token`,
//! `X-Provider-Refresh-Token` and `X-Refresh-Token`.
//!
//! ## Configuration
//!
//! - `GOOGLE_CALENDAR_BASE_URL` - Provider API root
//! - `CALENDAR_TIME_ZONE` - Time zone for new calendars and appointments
//! - `UPCOMING_WINDOW_DAYS` - Length of the upcoming window (default 7)

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AppointmentIntent, CalendarEvent, CalendarInfo, CalendarSyncError, CancelAction, CancelScope,
    EventDateTime, RecurrenceType,
};

pub use services::{
    AppointmentSyncService, CalendarHandleStore, CalendarSettings, GoogleCalendarClient,
    ProviderTokenSource, SupabaseCalendarStore, SupabaseProviderTokens,
};

pub use router::calendar_sync_routes;
