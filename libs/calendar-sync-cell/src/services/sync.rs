use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{
    AppointmentIntent, CalendarEvent, CalendarInfo, CalendarSyncError, CancelAction, CancelScope,
    EventDateTime, UpcomingAppointment, CALENDAR_DESCRIPTION, CALENDAR_SUMMARY,
};
use crate::services::google::GoogleCalendarClient;
use crate::services::recurrence::{describe_recurrence, recurrence_rule};
use crate::services::store::CalendarHandleStore;

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    /// Time zone for the therapist calendar and for appointments that carry
    /// none.
    pub time_zone: String,
    pub upcoming_window: Duration,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            upcoming_window: Duration::days(7),
        }
    }
}

impl CalendarSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            time_zone: config.calendar_time_zone.clone(),
            upcoming_window: Duration::days(config.upcoming_window_days),
        }
    }
}

/// Keeps a therapist's appointments in their provider calendar.
pub struct AppointmentSyncService {
    calendar: GoogleCalendarClient,
    store: Arc<dyn CalendarHandleStore>,
    settings: CalendarSettings,
    creation_lock: Arc<Mutex<()>>,
}

impl AppointmentSyncService {
    pub fn new(
        calendar: GoogleCalendarClient,
        store: Arc<dyn CalendarHandleStore>,
        settings: CalendarSettings,
    ) -> Self {
        Self {
            calendar,
            store,
            settings,
            creation_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serializes calendar creation with other services sharing `lock`.
    pub fn with_creation_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.creation_lock = lock;
        self
    }

    pub fn settings(&self) -> &CalendarSettings {
        &self.settings
    }

    /// The therapist's calendar id, creating and saving the calendar on
    /// first use.
    ///
    /// Creation is serialized by the creation lock and the store is re-read
    /// under it, so concurrent first requests create one calendar. If saving
    /// the new handle fails, the error is only logged and the new id is
    /// still returned; the next call then finds no stored handle and creates
    /// another calendar. At most one calendar per therapist holds only while
    /// the store accepts the save.
    #[instrument(skip(self))]
    pub async fn resolve_calendar_id(&self, user_id: &str) -> Result<String, CalendarSyncError> {
        let therapist = self.store.therapist_calendar(user_id).await?;
        if let Some(id) = therapist.calendar_id() {
            return Ok(id.to_string());
        }

        let _creating = self.creation_lock.lock().await;

        // Re-read: a concurrent request may have created it meanwhile.
        let therapist = self.store.therapist_calendar(user_id).await?;
        if let Some(id) = therapist.calendar_id() {
            return Ok(id.to_string());
        }

        info!("Creating appointment calendar for therapist {}", therapist.id);
        let created = self
            .calendar
            .create_calendar(CALENDAR_SUMMARY, CALENDAR_DESCRIPTION, &self.settings.time_zone)
            .await?;

        let info = CalendarInfo {
            id: created.id.clone(),
            name: created.summary.unwrap_or_else(|| CALENDAR_SUMMARY.to_string()),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.save_calendar_info(&therapist.id, &info).await {
            error!("Calendar {} created but not saved: {}", info.id, e);
        }

        Ok(created.id)
    }

    /// Appointments in the upcoming window. Failures degrade to an empty
    /// list so the dashboard still renders.
    pub async fn upcoming_appointments(&self, user_id: &str) -> Vec<CalendarEvent> {
        match self.fetch_upcoming(user_id, Utc::now()).await {
            Ok(events) => events,
            Err(e) => {
                error!("Error fetching upcoming appointments: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_upcoming(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarSyncError> {
        let calendar_id = self.resolve_calendar_id(user_id).await?;

        self.calendar
            .list_events(&calendar_id, now, now + self.settings.upcoming_window)
            .await
    }

    #[instrument(skip(self, intent), fields(title = %intent.title))]
    pub async fn create_appointment(
        &self,
        user_id: &str,
        intent: AppointmentIntent,
    ) -> Result<CalendarEvent, CalendarSyncError> {
        validate_intent(&intent)?;

        let calendar_id = self.resolve_calendar_id(user_id).await?;
        let body = self.event_body(&intent);

        let event = self.calendar.insert_event(&calendar_id, &body).await?;
        info!("Created appointment {}", event.id);

        Ok(event)
    }

    /// Cancels an appointment. The event is always fetched first: which
    /// mutation is safe depends on its recurrence shape on the provider.
    #[instrument(skip(self))]
    pub async fn cancel_appointment(
        &self,
        user_id: &str,
        event_id: &str,
        scope: CancelScope,
    ) -> Result<CancelAction, CalendarSyncError> {
        let calendar_id = self.resolve_calendar_id(user_id).await?;
        let event = self.calendar.get_event(&calendar_id, event_id).await?;

        let action = plan_cancellation(&event, event_id, scope);
        match &action {
            CancelAction::DeleteSeries { master_id } => {
                self.calendar
                    .delete_event(&calendar_id, master_id, "cancel appointment series")
                    .await?;
            }
            CancelAction::DeleteEvent { event_id } => {
                self.calendar
                    .delete_event(&calendar_id, event_id, "cancel appointment")
                    .await?;
            }
            CancelAction::MarkOccurrenceCancelled { event_id } => {
                self.calendar
                    .patch_event_status(&calendar_id, event_id, "cancelled")
                    .await?;
            }
        }

        info!("Cancelled appointment {}: {:?}", event_id, action);
        Ok(action)
    }

    fn event_body(&self, intent: &AppointmentIntent) -> Value {
        let mut body = json!({
            "summary": intent.title,
            "description": intent.description,
            "start": self.with_time_zone(&intent.start),
            "end": self.with_time_zone(&intent.end),
            "attendees": intent.attendees,
            "conferenceData": {
                "createRequest": {
                    "requestId": conference_request_id(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" }
                }
            },
            "guestsCanSeeOtherGuests": true,
            "guestsCanModify": false,
        });

        if let Some(location) = &intent.location {
            body["location"] = json!(location);
        }
        if let Some(rules) = recurrence_rule(intent.recurrence, intent.recurrence_end_date) {
            body["recurrence"] = json!(rules);
        }
        if let Some(patient_id) = &intent.patient_id {
            body["extendedProperties"] = json!({ "private": { "patientId": patient_id } });
        }

        body
    }

    fn with_time_zone(&self, time: &EventDateTime) -> EventDateTime {
        EventDateTime {
            time_zone: time
                .time_zone
                .clone()
                .or_else(|| Some(self.settings.time_zone.clone())),
            ..time.clone()
        }
    }
}

pub fn validate_intent(intent: &AppointmentIntent) -> Result<(), CalendarSyncError> {
    if intent.title.trim().is_empty() {
        return Err(CalendarSyncError::Validation(
            "Please enter an appointment title".to_string(),
        ));
    }

    let start = intent
        .start
        .instant()
        .ok_or_else(|| CalendarSyncError::Validation("Invalid start time".to_string()))?;
    let end = intent
        .end
        .instant()
        .ok_or_else(|| CalendarSyncError::Validation("Invalid end time".to_string()))?;

    if end <= start {
        return Err(CalendarSyncError::Validation(
            "End time must be after start time".to_string(),
        ));
    }

    Ok(())
}

/// Chooses the single mutation that cancels `scope` of `event`.
///
/// Deleting a series master removes every occurrence, so a single
/// occurrence of a master is marked cancelled instead.
pub fn plan_cancellation(event: &CalendarEvent, event_id: &str, scope: CancelScope) -> CancelAction {
    match scope {
        CancelScope::Series => CancelAction::DeleteSeries {
            master_id: event
                .recurring_event_id
                .clone()
                .unwrap_or_else(|| event_id.to_string()),
        },
        CancelScope::Single if event.recurring_event_id.is_some() => CancelAction::DeleteEvent {
            event_id: event_id.to_string(),
        },
        CancelScope::Single if event.recurrence.is_some() => CancelAction::MarkOccurrenceCancelled {
            event_id: event_id.to_string(),
        },
        CancelScope::Single => CancelAction::DeleteEvent {
            event_id: event_id.to_string(),
        },
    }
}

/// URI of the event's video entry point.
pub fn meeting_link(event: &CalendarEvent) -> Option<&str> {
    event
        .conference_data
        .as_ref()?
        .entry_points
        .as_ref()?
        .iter()
        .find(|entry| entry.entry_point_type.as_deref() == Some("video"))
        .and_then(|entry| entry.uri.as_deref())
}

/// Inserts `event` after every event that starts no later than it.
pub fn insert_chronologically(events: &mut Vec<CalendarEvent>, event: CalendarEvent) {
    let starts_at = event.starts_at();
    let position = events
        .iter()
        .position(|existing| existing.starts_at() > starts_at)
        .unwrap_or(events.len());

    events.insert(position, event);
}

/// Merges a freshly created event into a listing that may not show it yet.
pub fn merge_created(
    listing: &mut Vec<CalendarEvent>,
    created: &CalendarEvent,
    window_end: DateTime<Utc>,
) {
    if listing.iter().any(|event| event.id == created.id) {
        return;
    }

    match created.starts_at() {
        Some(start) if start <= window_end => insert_chronologically(listing, created.clone()),
        Some(_) => {}
        None => warn!("Created appointment {} has no start time", created.id),
    }
}

fn conference_request_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect();

    format!("meet-{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}

impl From<CalendarEvent> for UpcomingAppointment {
    fn from(event: CalendarEvent) -> Self {
        let meeting_link = meeting_link(&event).map(str::to_string);
        let recurrence_description = event
            .recurrence
            .as_deref()
            .and_then(describe_recurrence)
            .map(str::to_string);

        Self {
            event,
            meeting_link,
            recurrence_description,
        }
    }
}
