use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

pub const CALENDAR_SUMMARY: &str = "Neurova Appointments";
pub const CALENDAR_DESCRIPTION: &str = "Calendar for Neurova therapy appointments";
pub const MAX_UPCOMING_RESULTS: u32 = 50;
pub const REAUTHENTICATE_MESSAGE: &str = "Please re-authenticate with Google.";

// ==============================================================================
// PROVIDER EVENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn at(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            ..Self::default()
        }
    }

    /// Point in time used for ordering. Offset-less wall times and all-day
    /// dates are read as UTC.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        if let Some(value) = self.date_time.as_deref() {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
                return Some(parsed.with_timezone(&Utc));
            }
            return NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc());
        }

        self.date
            .as_deref()
            .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    #[serde(default)]
    pub entry_point_type: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceSolution {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_solution: Option<ConferenceSolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_points: Option<Vec<EntryPoint>>,
}

/// An event as the calendar provider reports it. The provider owns it; this
/// is only a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
    /// Present only on the master event of a recurring series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    /// Present only on instances of a recurring series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
}

impl CalendarEvent {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.start.as_ref().and_then(EventDateTime::instant)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some() || self.recurring_event_id.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
}

/// Secondary calendar resource returned by `POST /calendars`.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarResource {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
}

// ==============================================================================
// PERSISTED CALENDAR HANDLE
// ==============================================================================

/// Stored in `therapists.calendar_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TherapistCalendar {
    pub id: String,
    #[serde(default)]
    pub calendar_info: Option<CalendarInfo>,
}

impl TherapistCalendar {
    pub fn calendar_id(&self) -> Option<&str> {
        self.calendar_info
            .as_ref()
            .map(|info| info.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

// ==============================================================================
// APPOINTMENT INTENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
    #[default]
    None,
}

/// A locally authored appointment. It has no identity until the provider
/// accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentIntent {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(alias = "summary")]
    pub title: String,
    #[serde(default, alias = "notes")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub recurrence: RecurrenceType,
    #[serde(default)]
    pub recurrence_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelScope {
    #[default]
    Single,
    Series,
}

/// The one mutation a cancellation resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CancelAction {
    DeleteEvent { event_id: String },
    DeleteSeries { master_id: String },
    MarkOccurrenceCancelled { event_id: String },
}

// ==============================================================================
// HTTP DTOs
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelQuery {
    #[serde(default)]
    pub scope: CancelScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingAppointment {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub meeting_link: Option<String>,
    pub recurrence_description: Option<String>,
}

/// The created appointment plus the upcoming listing that includes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentResponse {
    pub appointment: UpcomingAppointment,
    pub upcoming: Vec<UpcomingAppointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentResponse {
    pub event_id: String,
    pub scope: CancelScope,
    pub performed: CancelAction,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum CalendarSyncError {
    #[error("Re-authentication required: {0}")]
    ReauthenticationRequired(String),

    #[error("Therapist profile not found")]
    TherapistNotFound,

    #[error("Failed to {action} ({status}): {body}")]
    Provider {
        action: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Calendar store error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CalendarSyncError {
    pub fn reauthenticate() -> Self {
        CalendarSyncError::ReauthenticationRequired(REAUTHENTICATE_MESSAGE.to_string())
    }
}

impl From<CalendarSyncError> for AppError {
    fn from(err: CalendarSyncError) -> Self {
        match err {
            CalendarSyncError::ReauthenticationRequired(msg) => AppError::Reauthenticate(msg),
            CalendarSyncError::TherapistNotFound => AppError::NotFound(err.to_string()),
            CalendarSyncError::Validation(msg) => AppError::ValidationError(msg),
            CalendarSyncError::Store(msg) => AppError::Database(msg),
            CalendarSyncError::Provider { .. } | CalendarSyncError::Http(_) => {
                AppError::ExternalService(err.to_string())
            }
        }
    }
}
