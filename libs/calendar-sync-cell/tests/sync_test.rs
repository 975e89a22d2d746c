use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use mockall::mock;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calendar_sync_cell::models::{
    AppointmentIntent, CalendarInfo, CalendarSyncError, CancelAction, CancelScope, EventDateTime,
    RecurrenceType, TherapistCalendar,
};
use calendar_sync_cell::services::{
    AppointmentSyncService, CalendarHandleStore, CalendarSettings, GoogleCalendarClient,
    ProviderTokenSource, SupabaseProviderTokens,
};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::ProviderSession;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

const CALENDAR_ID: &str = "cal-1@group.calendar.google.com";
const EVENTS_PATH: &str = "/calendar/v3/calendars/cal-1%40group.calendar.google.com/events";

mock! {
    pub Tokens {}

    #[async_trait]
    impl ProviderTokenSource for Tokens {
        async fn access_token(&self) -> Result<String, CalendarSyncError>;
        async fn refresh_access_token(&self) -> Result<String, CalendarSyncError>;
    }
}

struct InMemoryStore {
    therapist_id: String,
    info: Mutex<Option<CalendarInfo>>,
    saves: AtomicUsize,
}

impl InMemoryStore {
    fn empty() -> Self {
        Self {
            therapist_id: "therapist-1".to_string(),
            info: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    fn with_calendar(calendar_id: &str) -> Self {
        let store = Self::empty();
        *store.info.lock().unwrap() = Some(CalendarInfo {
            id: calendar_id.to_string(),
            name: "Neurova Appointments".to_string(),
            created_at: Utc::now(),
        });
        store
    }
}

#[async_trait]
impl CalendarHandleStore for InMemoryStore {
    async fn therapist_calendar(&self, _user_id: &str) -> Result<TherapistCalendar, CalendarSyncError> {
        Ok(TherapistCalendar {
            id: self.therapist_id.clone(),
            calendar_info: self.info.lock().unwrap().clone(),
        })
    }

    async fn save_calendar_info(
        &self,
        therapist_id: &str,
        info: &CalendarInfo,
    ) -> Result<(), CalendarSyncError> {
        assert_eq!(therapist_id, self.therapist_id);
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.info.lock().unwrap() = Some(info.clone());
        Ok(())
    }
}

fn valid_tokens() -> MockTokens {
    let mut tokens = MockTokens::new();
    tokens
        .expect_access_token()
        .returning(|| Ok("google-access-token".to_string()));
    tokens.expect_refresh_access_token().never();
    tokens
}

fn service(
    mock_server: &MockServer,
    tokens: impl ProviderTokenSource + 'static,
    store: Arc<InMemoryStore>,
) -> AppointmentSyncService {
    let calendar = GoogleCalendarClient::new(
        reqwest::Client::new(),
        &format!("{}/calendar/v3", mock_server.uri()),
        Arc::new(tokens),
    );
    AppointmentSyncService::new(calendar, store, CalendarSettings::default())
}

async fn mount_event(mock_server: &MockServer, event_id: &str, event: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", EVENTS_PATH, event_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(event))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn expect_delete(mock_server: &MockServer, event_id: &str, times: u64) {
    Mock::given(method("DELETE"))
        .and(path(format!("{}/{}", EVENTS_PATH, event_id)))
        .and(query_param("sendUpdates", "all"))
        .respond_with(ResponseTemplate::new(204))
        .expect(times)
        .mount(mock_server)
        .await;
}

async fn expect_no_patch(mock_server: &MockServer) {
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(mock_server)
        .await;
}

// ==============================================================================
// CANCELLATION ROUTING
// ==============================================================================

#[tokio::test]
async fn test_cancel_single_instance_deletes_instance() {
    let mock_server = MockServer::start().await;
    mount_event(
        &mock_server,
        "master_20250110T100000Z",
        json!({ "id": "master_20250110T100000Z", "recurringEventId": "master" }),
    )
    .await;
    expect_delete(&mock_server, "master_20250110T100000Z", 1).await;
    expect_delete(&mock_server, "master", 0).await;
    expect_no_patch(&mock_server).await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let action = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "master_20250110T100000Z", CancelScope::Single)
        .await
        .unwrap();

    assert_eq!(
        action,
        CancelAction::DeleteEvent { event_id: "master_20250110T100000Z".to_string() }
    );
}

#[tokio::test]
async fn test_cancel_single_occurrence_of_master_patches_status() {
    let mock_server = MockServer::start().await;
    mount_event(
        &mock_server,
        "master",
        json!({ "id": "master", "recurrence": ["RRULE:FREQ=WEEKLY"] }),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/master", EVENTS_PATH)))
        .and(query_param("sendUpdates", "all"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "master", "status": "cancelled" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let action = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "master", CancelScope::Single)
        .await
        .unwrap();

    assert_eq!(action, CancelAction::MarkOccurrenceCancelled { event_id: "master".to_string() });
}

#[tokio::test]
async fn test_cancel_series_from_instance_deletes_master() {
    let mock_server = MockServer::start().await;
    mount_event(
        &mock_server,
        "master_20250110T100000Z",
        json!({ "id": "master_20250110T100000Z", "recurringEventId": "master" }),
    )
    .await;
    expect_delete(&mock_server, "master", 1).await;
    expect_delete(&mock_server, "master_20250110T100000Z", 0).await;
    expect_no_patch(&mock_server).await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let action = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "master_20250110T100000Z", CancelScope::Series)
        .await
        .unwrap();

    assert_eq!(action, CancelAction::DeleteSeries { master_id: "master".to_string() });
}

#[tokio::test]
async fn test_cancel_plain_event_deletes_it() {
    let mock_server = MockServer::start().await;
    mount_event(&mock_server, "one-off", json!({ "id": "one-off", "status": "confirmed" })).await;
    expect_delete(&mock_server, "one-off", 1).await;
    expect_no_patch(&mock_server).await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let action = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "one-off", CancelScope::Single)
        .await
        .unwrap();

    assert_eq!(action, CancelAction::DeleteEvent { event_id: "one-off".to_string() });
}

#[tokio::test]
async fn test_cancel_aborts_when_event_cannot_be_fetched() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/missing", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;
    expect_no_patch(&mock_server).await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "missing", CancelScope::Series)
        .await;

    assert_matches!(
        result,
        Err(CalendarSyncError::Provider { action: "fetch event details", status, .. })
            if status == StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_delete_of_gone_event_is_reported() {
    let mock_server = MockServer::start().await;
    mount_event(&mock_server, "one-off", json!({ "id": "one-off" })).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/one-off", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(410).set_body_string("Resource has been deleted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, valid_tokens(), store)
        .cancel_appointment("user-1", "one-off", CancelScope::Single)
        .await;

    assert_matches!(
        result,
        Err(CalendarSyncError::Provider { status, body, .. })
            if status == StatusCode::GONE && body == "Resource has been deleted"
    );
}

// ==============================================================================
// TOKEN REFRESH
// ==============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("Authorization", "Bearer expired-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(header("Authorization", "Bearer fresh-token"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "evt-1", "start": { "dateTime": "2025-01-02T10:00:00Z" } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut tokens = MockTokens::new();
    tokens
        .expect_access_token()
        .times(1)
        .returning(|| Ok("expired-token".to_string()));
    tokens
        .expect_refresh_access_token()
        .times(1)
        .returning(|| Ok("fresh-token".to_string()));

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let events = service(&mock_server, tokens, store)
        .fetch_upcoming("user-1", Utc::now())
        .await
        .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "evt-1");
}

#[tokio::test]
async fn test_second_unauthorized_requires_reauthentication() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut tokens = MockTokens::new();
    tokens
        .expect_access_token()
        .returning(|| Ok("expired-token".to_string()));
    tokens
        .expect_refresh_access_token()
        .times(1)
        .returning(|| Ok("still-rejected".to_string()));

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, tokens, store)
        .fetch_upcoming("user-1", Utc::now())
        .await;

    assert_matches!(result, Err(CalendarSyncError::ReauthenticationRequired(_)));
}

#[tokio::test]
async fn test_failed_refresh_stops_without_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut tokens = MockTokens::new();
    tokens
        .expect_access_token()
        .returning(|| Ok("expired-token".to_string()));
    tokens
        .expect_refresh_access_token()
        .times(1)
        .returning(|| Err(CalendarSyncError::reauthenticate()));

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, tokens, store)
        .fetch_upcoming("user-1", Utc::now())
        .await;

    assert_matches!(result, Err(CalendarSyncError::ReauthenticationRequired(_)));
}

#[tokio::test]
async fn test_refresh_through_hosted_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "session-refresh-token" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockSupabaseResponses::refreshed_session(Some("fresh-google-token"))),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt-1", EVENTS_PATH)))
        .and(header("Authorization", "Bearer google-access-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt-1", EVENTS_PATH)))
        .and(header("Authorization", "Bearer fresh-google-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let tokens = Arc::new(SupabaseProviderTokens::new(
        Arc::new(SupabaseClient::new(&config)),
        TestUser::default().provider_session(),
    ));
    let calendar = GoogleCalendarClient::new(
        reqwest::Client::new(),
        &config.google_calendar_base_url,
        tokens.clone(),
    );

    let event = calendar.get_event(CALENDAR_ID, "evt-1").await.unwrap();
    assert_eq!(event.id, "evt-1");

    let session = tokens.session().await;
    assert_eq!(session.provider_token.as_deref(), Some("fresh-google-token"));
    assert_eq!(session.access_token, "refreshed-access-token");
    assert_eq!(session.refresh_token.as_deref(), Some("rotated-refresh-token"));
}

#[tokio::test]
async fn test_refresh_without_hosted_session_requires_reauthentication() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/evt-1", EVENTS_PATH)))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let session = ProviderSession {
        refresh_token: None,
        ..TestUser::default().provider_session()
    };
    let tokens = Arc::new(SupabaseProviderTokens::new(
        Arc::new(SupabaseClient::new(&config)),
        session,
    ));
    let calendar = GoogleCalendarClient::new(
        reqwest::Client::new(),
        &config.google_calendar_base_url,
        tokens,
    );

    let err = calendar.get_event(CALENDAR_ID, "evt-1").await.unwrap_err();
    assert_matches!(err, CalendarSyncError::ReauthenticationRequired(_));
    assert_matches!(AppError::from(err), AppError::Reauthenticate(_));
}

#[tokio::test]
async fn test_any_refresh_failure_requires_reauthentication() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut tokens = MockTokens::new();
    tokens
        .expect_access_token()
        .returning(|| Ok("expired-token".to_string()));
    tokens
        .expect_refresh_access_token()
        .times(1)
        .returning(|| Err(CalendarSyncError::Store("session lookup failed".to_string())));

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, tokens, store)
        .fetch_upcoming("user-1", Utc::now())
        .await;

    assert_matches!(result, Err(CalendarSyncError::ReauthenticationRequired(_)));
}

// ==============================================================================
// CALENDAR HANDLE & CREATION
// ==============================================================================

struct RejectingStore {
    saves: AtomicUsize,
}

#[async_trait]
impl CalendarHandleStore for RejectingStore {
    async fn therapist_calendar(&self, _user_id: &str) -> Result<TherapistCalendar, CalendarSyncError> {
        Ok(TherapistCalendar {
            id: "therapist-1".to_string(),
            calendar_info: None,
        })
    }

    async fn save_calendar_info(
        &self,
        _therapist_id: &str,
        _info: &CalendarInfo,
    ) -> Result<(), CalendarSyncError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(CalendarSyncError::Store("permission denied".to_string()))
    }
}

#[tokio::test]
async fn test_unsaved_calendar_is_used_but_not_remembered() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-cal@group.calendar.google.com",
            "summary": "Neurova Appointments"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = Arc::new(RejectingStore { saves: AtomicUsize::new(0) });
    let calendar = GoogleCalendarClient::new(
        reqwest::Client::new(),
        &format!("{}/calendar/v3", mock_server.uri()),
        Arc::new(valid_tokens()),
    );
    let service = AppointmentSyncService::new(calendar, store.clone(), CalendarSettings::default());

    assert_eq!(
        service.resolve_calendar_id("user-1").await.unwrap(),
        "new-cal@group.calendar.google.com"
    );
    service.resolve_calendar_id("user-1").await.unwrap();

    assert_eq!(store.saves.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_calendar_created_once_and_remembered() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars"))
        .and(body_partial_json(json!({
            "summary": "Neurova Appointments",
            "description": "Calendar for Neurova therapy appointments",
            "timeZone": "UTC"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-cal@group.calendar.google.com",
            "summary": "Neurova Appointments"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::empty());
    let service = service(&mock_server, valid_tokens(), store.clone());

    let first = service.resolve_calendar_id("user-1").await.unwrap();
    let second = service.resolve_calendar_id("user-1").await.unwrap();

    assert_eq!(first, "new-cal@group.calendar.google.com");
    assert_eq!(second, first);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_first_use_creates_one_calendar() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-cal@group.calendar.google.com",
            "summary": "Neurova Appointments"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::empty());
    let service = service(&mock_server, valid_tokens(), store.clone());

    let results = join_all((0..5).map(|_| service.resolve_calendar_id("user-1"))).await;

    for result in results {
        assert_eq!(result.unwrap(), "new-cal@group.calendar.google.com");
    }
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_appointment_builds_recurring_meet_event() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(query_param("conferenceDataVersion", "1"))
        .and(query_param("sendUpdates", "all"))
        .and(body_partial_json(json!({
            "summary": "Weekly therapy",
            "start": { "dateTime": "2025-01-06T10:00:00", "timeZone": "UTC" },
            "end": { "dateTime": "2025-01-06T11:00:00", "timeZone": "America/New_York" },
            "recurrence": ["RRULE:FREQ=WEEKLY;INTERVAL=2;UNTIL=20251231T235959Z"],
            "conferenceData": { "createRequest": { "conferenceSolutionKey": { "type": "hangoutsMeet" } } },
            "guestsCanSeeOtherGuests": true,
            "guestsCanModify": false,
            "extendedProperties": { "private": { "patientId": "patient-1" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "created-1",
            "summary": "Weekly therapy",
            "recurrence": ["RRULE:FREQ=WEEKLY;INTERVAL=2;UNTIL=20251231T235959Z"],
            "conferenceData": {
                "entryPoints": [{ "entryPointType": "video", "uri": "https://meet.google.com/abc" }]
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let intent = AppointmentIntent {
        patient_id: Some("patient-1".to_string()),
        title: "Weekly therapy".to_string(),
        description: Some("Follow-up".to_string()),
        start: EventDateTime::at("2025-01-06T10:00:00"),
        end: EventDateTime {
            time_zone: Some("America/New_York".to_string()),
            ..EventDateTime::at("2025-01-06T11:00:00")
        },
        attendees: Vec::new(),
        location: None,
        recurrence: RecurrenceType::Biweekly,
        recurrence_end_date: NaiveDate::from_ymd_opt(2025, 12, 31),
    };

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let event = service(&mock_server, valid_tokens(), store)
        .create_appointment("user-1", intent)
        .await
        .unwrap();

    assert_eq!(event.id, "created-1");
}

#[tokio::test]
async fn test_invalid_intent_makes_no_calls() {
    let mock_server = MockServer::start().await;
    let mut tokens = MockTokens::new();
    tokens.expect_access_token().never();

    let intent = AppointmentIntent {
        patient_id: None,
        title: "Backwards".to_string(),
        description: None,
        start: EventDateTime::at("2025-01-06T11:00:00"),
        end: EventDateTime::at("2025-01-06T10:00:00"),
        attendees: Vec::new(),
        location: None,
        recurrence: RecurrenceType::None,
        recurrence_end_date: None,
    };

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, tokens, store)
        .create_appointment("user-1", intent)
        .await;

    assert_matches!(result, Err(CalendarSyncError::Validation(_)));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_creation_failure_is_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid start time"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let intent = AppointmentIntent {
        patient_id: None,
        title: "Session".to_string(),
        description: None,
        start: EventDateTime::at("2025-01-06T10:00:00"),
        end: EventDateTime::at("2025-01-06T11:00:00"),
        attendees: Vec::new(),
        location: None,
        recurrence: RecurrenceType::None,
        recurrence_end_date: None,
    };

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let result = service(&mock_server, valid_tokens(), store)
        .create_appointment("user-1", intent)
        .await;

    assert_matches!(
        result,
        Err(CalendarSyncError::Provider { action: "create appointment", .. })
    );
}

#[tokio::test]
async fn test_upcoming_degrades_to_empty() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryStore::with_calendar(CALENDAR_ID));
    let events = service(&mock_server, valid_tokens(), store)
        .upcoming_appointments("user-1")
        .await;

    assert!(events.is_empty());
}
