//! Google Calendar target collaborator, against the Calendar v3 REST API.

use anyhow::Result;
use calbridge_core::{EventTime, NormalizedEvent, SyncError, SyncResult, TargetCalendar};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::token::{OAuthClient, StoredTokens, TokenKeeper};
use crate::config::GoogleConfig;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Writes mirrored events into one Google Calendar.
pub struct GoogleTarget {
    http: Client,
    tokens: TokenKeeper,
    calendar_id: String,
}

impl GoogleTarget {
    /// Load the OAuth client and previously granted tokens. Fails with a
    /// pointer at `calbridge auth` when no tokens have been granted yet.
    pub fn connect(config: &GoogleConfig) -> Result<Self> {
        let client = OAuthClient::load(&config.credentials_file)?;
        let stored = StoredTokens::load(&config.token_file)?;

        Ok(GoogleTarget {
            http: Client::new(),
            tokens: TokenKeeper::new(client, config.token_file.clone(), stored),
            calendar_id: config.calendar_id.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!("{API_BASE}/calendars/{}/events", self.calendar_id)
    }

    async fn bearer(&self) -> SyncResult<String> {
        self.tokens
            .access_token(&self.http)
            .await
            .map_err(|e| SyncError::Write(format!("token refresh failed: {e:#}")))
    }
}

impl TargetCalendar for GoogleTarget {
    async fn create_event(&self, event: &NormalizedEvent) -> SyncResult<String> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&event_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Write(format!("create '{}': {e}", event.uid)))?;

        let response = check(response, "create", &event.uid).await?;
        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| SyncError::Write(format!("create '{}': invalid response: {e}", event.uid)))?;

        Ok(created.id)
    }

    async fn update_event(&self, target_id: &str, event: &NormalizedEvent) -> SyncResult<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .put(format!("{}/{target_id}", self.events_url()))
            .bearer_auth(token)
            .json(&event_body(event))
            .send()
            .await
            .map_err(|e| SyncError::Write(format!("update '{}': {e}", event.uid)))?;

        check(response, "update", &event.uid).await?;
        Ok(())
    }

    async fn delete_event(&self, target_id: &str) -> SyncResult<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .delete(format!("{}/{target_id}", self.events_url()))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Write(format!("delete '{target_id}': {e}")))?;

        // An item that is already gone counts as deleted: deletes are retried
        // across cycles and must stay idempotent.
        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::GONE {
            return Ok(());
        }

        check(response, "delete", target_id).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into a Write error carrying status and body.
async fn check(response: Response, op: &str, subject: &str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Write(format!("{op} '{subject}': {status}: {body}")))
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

/// Wire shape of a Calendar v3 event write.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: TimeBody,
    end: TimeBody,
    extended_properties: ExtendedProperties,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

/// Opaque metadata attached to every mirrored item, so mirrored events can be
/// recognized (and state rebuilt) from the target alone.
#[derive(Serialize)]
struct ExtendedProperties {
    private: PrivateProperties,
}

#[derive(Serialize)]
struct PrivateProperties {
    source_uid: String,
    fingerprint: String,
    source_calendar: String,
}

fn event_body(event: &NormalizedEvent) -> EventBody {
    EventBody {
        summary: event.summary.clone(),
        description: event.description.clone(),
        location: event.location.clone(),
        start: time_body(&event.start),
        end: time_body(&event.end),
        extended_properties: ExtendedProperties {
            private: PrivateProperties {
                source_uid: event.uid.clone(),
                fingerprint: event.fingerprint.clone(),
                source_calendar: event.calendar_name.clone(),
            },
        },
    }
}

/// All-day events carry a plain `date`, timed events a UTC `dateTime`.
fn time_body(time: &EventTime) -> TimeBody {
    match time {
        EventTime::Date(date) => TimeBody {
            date: Some(date.format("%Y-%m-%d").to_string()),
            date_time: None,
            time_zone: None,
        },
        EventTime::DateTime(datetime) => TimeBody {
            date: None,
            date_time: Some(datetime.to_rfc3339()),
            time_zone: Some("UTC".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn timed_events_serialize_with_utc_datetimes() {
        let event = NormalizedEvent::new(
            "uid-1@icloud.com",
            "Planning",
            Some("Quarterly planning".to_string()),
            Some("Room 4".to_string()),
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()),
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 1, 15, 11, 0, 0).unwrap()),
            "Work",
        );

        let body = serde_json::to_value(event_body(&event)).unwrap();

        assert_eq!(body["summary"], "Planning");
        assert_eq!(body["description"], "Quarterly planning");
        assert_eq!(body["location"], "Room 4");
        assert_eq!(
            body["start"],
            json!({"dateTime": "2026-01-15T10:00:00+00:00", "timeZone": "UTC"})
        );
        assert_eq!(
            body["end"],
            json!({"dateTime": "2026-01-15T11:00:00+00:00", "timeZone": "UTC"})
        );
    }

    #[test]
    fn all_day_events_serialize_with_plain_dates() {
        let event = NormalizedEvent::new(
            "uid-2@icloud.com",
            "Public holiday",
            None,
            None,
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()),
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 11).unwrap()),
            "Holidays",
        );

        let body = serde_json::to_value(event_body(&event)).unwrap();

        assert_eq!(body["start"], json!({"date": "2026-03-10"}));
        assert_eq!(body["end"], json!({"date": "2026-03-11"}));
        // Absent optionals are omitted entirely, not sent as null.
        assert!(body.get("description").is_none());
        assert!(body.get("location").is_none());
    }

    #[test]
    fn writes_carry_the_source_identity_as_private_metadata() {
        let event = NormalizedEvent::new(
            "uid-3@icloud.com",
            "Standup",
            None,
            None,
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()),
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 4, 1, 9, 15, 0).unwrap()),
            "Work",
        );

        let body = serde_json::to_value(event_body(&event)).unwrap();
        let private = &body["extendedProperties"]["private"];

        assert_eq!(private["source_uid"], "uid-3@icloud.com");
        assert_eq!(private["fingerprint"], event.fingerprint);
        assert_eq!(private["source_calendar"], "Work");
    }
}
