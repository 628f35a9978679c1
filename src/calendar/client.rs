//! Google Calendar v3 client for a single account.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::credentials::{OAuthClient, StoredToken};
use super::{CalendarError, CalendarSource};
use crate::models::Event;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    #[serde(default)]
    summary: Option<String>,
    start: ApiEventTime,
    #[serde(default)]
    end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Reads the primary calendar of one account.
pub struct GoogleCalendar {
    label: String,
    http: Client,
    oauth: Arc<OAuthClient>,
    token: Mutex<StoredToken>,
    api_base: String,
}

impl GoogleCalendar {
    pub fn new(
        label: impl Into<String>,
        http: Client,
        oauth: Arc<OAuthClient>,
        token: StoredToken,
    ) -> Self {
        Self {
            label: label.into(),
            http,
            oauth,
            token: Mutex::new(token),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        let mut token = self.token.lock().await;
        if token.is_fresh(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            CalendarError::Credentials(format!(
                "{}: access token expired and no refresh token stored",
                self.label
            ))
        })?;
        debug!("Refreshing access token for {}", self.label);
        *token = self.oauth.refresh(&self.http, &refresh_token).await?;
        Ok(token.access_token.clone())
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    fn label(&self) -> &str {
        &self.label
    }

    async fn upcoming(
        &self,
        max: u32,
        within: Option<Duration>,
    ) -> Result<Vec<Event>, CalendarError> {
        let access_token = self.access_token().await?;
        let now = Utc::now();

        let mut query = vec![
            ("timeMin", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("maxResults", max.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("showDeleted", "false".to_string()),
        ];
        if let Some(time_max) = time_max(now, within)? {
            query.push(("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let response = self
            .http
            .get(format!("{}/calendars/primary/events", self.api_base))
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api { status, body });
        }

        let page: EventsPage = response.json().await?;
        page.items.into_iter().map(convert_event).collect()
    }
}

/// Upper bound of the query window. `None` (or zero) means unbounded.
fn time_max(
    now: DateTime<Utc>,
    within: Option<Duration>,
) -> Result<Option<DateTime<Utc>>, CalendarError> {
    let Some(within) = within.filter(|w| !w.is_zero()) else {
        return Ok(None);
    };
    chrono::Duration::from_std(within)
        .ok()
        .and_then(|horizon| now.checked_add_signed(horizon))
        .map(Some)
        .ok_or_else(|| CalendarError::Parse(format!("horizon {:?} out of range", within)))
}

fn convert_event(item: ApiEvent) -> Result<Event, CalendarError> {
    let start = parse_event_time(&item.start)?;
    let end = item.end.as_ref().and_then(|end| parse_event_time(end).ok());
    Ok(Event {
        title: item.summary.unwrap_or_default(),
        start,
        end,
    })
}

/// Timed events carry `dateTime`; all-day events only a `date`, read as
/// local midnight.
fn parse_event_time(time: &ApiEventTime) -> Result<DateTime<FixedOffset>, CalendarError> {
    if let Some(raw) = time.date_time.as_deref().filter(|s| !s.is_empty()) {
        return DateTime::parse_from_rfc3339(raw)
            .map_err(|e| CalendarError::Parse(format!("{}: {}", raw, e)));
    }
    if let Some(raw) = time.date.as_deref().filter(|s| !s.is_empty()) {
        let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| CalendarError::Parse(format!("{}: {}", raw, e)))?;
        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CalendarError::Parse(format!("{}: no midnight", raw)))?;
        return Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(DateTime::<FixedOffset>::from)
            .ok_or_else(|| CalendarError::Parse(format!("{}: not a local time", raw)));
    }
    Err(CalendarError::Parse(
        "event has neither dateTime nor date".into(),
    ))
}
