use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use urlencoding::encode;

use crate::models::{CalendarEvent, CalendarResource, CalendarSyncError, EventList, MAX_UPCOMING_RESULTS};
use crate::services::tokens::ProviderTokenSource;

/// Bearer-authenticated client for the calendar provider's REST API.
///
/// Every call carries the cached provider token. A 401 triggers exactly one
/// refresh and one retry; a second 401 means the user has to sign in with
/// the provider again.
pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn ProviderTokenSource>,
}

impl GoogleCalendarClient {
    pub fn new(client: Client, base_url: &str, tokens: Arc<dyn ProviderTokenSource>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn calendars_url(&self) -> String {
        format!("{}/calendars", self.base_url)
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, encode(calendar_id))
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!("{}/{}", self.events_url(calendar_id), encode(event_id))
    }

    fn build(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(token)
            .query(query);

        if let Some(body) = body {
            request = request.json(body);
        }

        request
    }

    async fn send_authorized(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, CalendarSyncError> {
        debug!("Making {} request to {}", method, url);

        let token = self.tokens.access_token().await?;
        let response = self.build(&method, url, query, body, &token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Access token expired, refreshing...");
        let token = self.tokens.refresh_access_token().await.map_err(|e| match e {
            CalendarSyncError::ReauthenticationRequired(_) => e,
            other => {
                error!("Error refreshing token: {}", other);
                CalendarSyncError::reauthenticate()
            }
        })?;

        let response = self.build(&method, url, query, body, &token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            error!("Provider rejected the refreshed access token");
            return Err(CalendarSyncError::reauthenticate());
        }

        Ok(response)
    }

    async fn call(
        &self,
        action: &'static str,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, CalendarSyncError> {
        let response = self.send_authorized(method, url, query, body).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to {} ({}): {}", action, status, body);
            return Err(CalendarSyncError::Provider { action, status, body });
        }

        Ok(response)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        action: &'static str,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, CalendarSyncError> {
        let response = self.call(action, method, url, query, body).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn create_calendar(
        &self,
        summary: &str,
        description: &str,
        time_zone: &str,
    ) -> Result<CalendarResource, CalendarSyncError> {
        let body = json!({
            "summary": summary,
            "description": description,
            "timeZone": time_zone,
        });

        self.call_json("create calendar", Method::POST, &self.calendars_url(), &[], Some(&body))
            .await
    }

    /// Single expanded instances in `[time_min, time_max]`, ordered by start.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarSyncError> {
        let query = [
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("maxResults", MAX_UPCOMING_RESULTS.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];

        let list: EventList = self
            .call_json("fetch events", Method::GET, &self.events_url(calendar_id), &query, None)
            .await?;

        Ok(list.items)
    }

    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &Value,
    ) -> Result<CalendarEvent, CalendarSyncError> {
        let query = [
            ("conferenceDataVersion", "1".to_string()),
            ("sendUpdates", "all".to_string()),
        ];

        self.call_json(
            "create appointment",
            Method::POST,
            &self.events_url(calendar_id),
            &query,
            Some(event),
        )
        .await
    }

    pub async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<CalendarEvent, CalendarSyncError> {
        self.call_json(
            "fetch event details",
            Method::GET,
            &self.event_url(calendar_id, event_id),
            &[],
            None,
        )
        .await
    }

    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        action: &'static str,
    ) -> Result<(), CalendarSyncError> {
        let query = [("sendUpdates", "all".to_string())];

        self.call(action, Method::DELETE, &self.event_url(calendar_id, event_id), &query, None)
            .await?;

        Ok(())
    }

    pub async fn patch_event_status(
        &self,
        calendar_id: &str,
        event_id: &str,
        status: &str,
    ) -> Result<CalendarEvent, CalendarSyncError> {
        let query = [("sendUpdates", "all".to_string())];
        let body = json!({ "status": status });

        self.call_json(
            "cancel appointment",
            Method::PATCH,
            &self.event_url(calendar_id, event_id),
            &query,
            Some(&body),
        )
        .await
    }
}
