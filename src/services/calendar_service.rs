use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const EVENTS_URL: &str =
    "https://www.googleapis.com/calendar/v3/calendars/primary/events?conferenceDataVersion=1&sendUpdates=all";
const EVENT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct CalendarEventRequest {
    pub refresh_token: String,
    pub candidate_email: String,
    pub interviewer_email: String,
    pub subject: String,
    pub starts_at: DateTime<Utc>,
    pub agenda: Option<String>,
    pub instructions: Option<String>,
    pub resume_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub event_id: String,
    /// Conferencing URL, empty when the provider returned none.
    pub meeting_link: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CreatedEvent>;
}

#[derive(Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    client_id: String,
    client_secret: String,
}

impl GoogleCalendarClient {
    pub fn new(client_id: String, client_secret: String, client: Client) -> Self {
        Self {
            client,
            client_id,
            client_secret,
        }
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<String> {
        let res = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Calendar(format!("Google token request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Calendar(format!(
                "Google token error {}: {}",
                status, text
            )));
        }

        let body: JsonValue = res
            .json()
            .await
            .map_err(|e| Error::Calendar(format!("Google token response was not JSON: {}", e)))?;

        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Calendar("Google token response had no access_token".to_string()))
    }
}

fn event_body(request: &CalendarEventRequest) -> JsonValue {
    let title = if request.subject.trim().is_empty() {
        format!(
            "Interview: {} & {}",
            request.candidate_email, request.interviewer_email
        )
    } else {
        request.subject.clone()
    };

    let mut description = request
        .agenda
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            request
                .instructions
                .clone()
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or_default();

    if let Some(url) = request.resume_url.as_deref().filter(|u| !u.trim().is_empty()) {
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str("Resume: ");
        description.push_str(url);
    }

    let ends_at = request.starts_at + chrono::Duration::minutes(EVENT_DURATION_MINUTES);

    serde_json::json!({
        "summary": title,
        "description": description,
        "start": { "dateTime": request.starts_at.to_rfc3339() },
        "end": { "dateTime": ends_at.to_rfc3339() },
        "attendees": [
            { "email": request.candidate_email },
            { "email": request.interviewer_email }
        ],
        "conferenceData": {
            "createRequest": {
                "requestId": Uuid::new_v4().to_string(),
                "conferenceSolutionKey": { "type": "hangoutsMeet" }
            }
        }
    })
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CreatedEvent> {
        let access_token = self.exchange_refresh_token(&request.refresh_token).await?;

        let res = self
            .client
            .post(EVENTS_URL)
            .bearer_auth(&access_token)
            .json(&event_body(request))
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Calendar(format!("Google Calendar request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Calendar(format!(
                "Google Calendar API Error {}: {}",
                status, text
            )));
        }

        let created: JsonValue = res.json().await.map_err(|e| {
            Error::Calendar(format!("Google Calendar response was not JSON: {}", e))
        })?;

        let event_id = created
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Calendar("Google Calendar response had no event id".to_string()))?;

        let meeting_link = created
            .get("conferenceData")
            .and_then(|c| c.get("entryPoints"))
            .and_then(|e| e.as_array())
            .and_then(|points| {
                points.iter().find(|p| {
                    p.get("entryPointType").and_then(|t| t.as_str()) == Some("video")
                })
            })
            .and_then(|p| p.get("uri"))
            .and_then(|u| u.as_str())
            .unwrap_or("")
            .to_string();

        Ok(CreatedEvent {
            event_id,
            meeting_link,
        })
    }
}
