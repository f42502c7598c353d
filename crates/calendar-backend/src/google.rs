//! Google Calendar v3 backend
//!
//! Lists events with `singleEvents=true` so recurring series arrive expanded,
//! and inserts events with wall-clock times plus an IANA zone name. Every
//! call resolves a bearer token through the `CredentialManager` first.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat};
use google_auth::CredentialManager;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::{CalendarBackend, CalendarEvent, CreatedEvent, EventTime, NewEvent, TimeWindow};

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Upper bound the API accepts per page is 2500; 250 is its default.
const PAGE_SIZE: &str = "250";

pub struct GoogleCalendar {
    http: reqwest::Client,
    api_base: String,
    calendar_id: String,
    credentials: Arc<CredentialManager>,
}

impl GoogleCalendar {
    pub fn new(
        http: reqwest::Client,
        calendar_id: String,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            http,
            api_base: GOOGLE_CALENDAR_API.to_string(),
            calendar_id,
            credentials,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base;
        self
    }

    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| Error::Http(format!("invalid api_base {}: {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Http(format!("api_base {} cannot hold a path", self.api_base)))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    async fn fetch_events(&self, window: TimeWindow) -> Result<Vec<CalendarEvent>> {
        let token = self.credentials.resolve().await?;
        let url = self.events_url()?;
        let time_min = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(t) = page_token.as_deref() {
                query.push(("pageToken", t));
            }

            let response = self
                .http
                .get(url.clone())
                .bearer_auth(token.bearer())
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::Http(format!("listing events: {e}")))?;
            let page: EventsPage = decode(response).await?;

            for item in page.items {
                if let Some(event) = item.into_event()? {
                    events.push(event);
                }
            }

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(
            calendar_id = %self.calendar_id,
            %time_min,
            %time_max,
            events = events.len(),
            "listed events"
        );
        Ok(events)
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let token = self.credentials.resolve().await?;
        let url = self.events_url()?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token.bearer())
            .json(&InsertEvent::from(event))
            .send()
            .await
            .map_err(|e| Error::Http(format!("inserting event: {e}")))?;
        let created: InsertedEvent = decode(response).await?;

        debug!(calendar_id = %self.calendar_id, event_id = %created.id, "inserted event");
        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }
}

impl CalendarBackend for GoogleCalendar {
    fn id(&self) -> &str {
        "google"
    }

    fn list_events(
        &self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarEvent>>> + Send + '_>> {
        Box::pin(self.fetch_events(window))
    }

    fn insert_event<'a>(
        &'a self,
        event: &'a NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedEvent>> + Send + 'a>> {
        Box::pin(self.create_event(event))
    }
}

/// Map non-success statuses to `Error::Api`, then decode the JSON body.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Decode(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    start: Option<GoogleEventTime>,
    end: Option<GoogleEventTime>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl GoogleEvent {
    /// Cancelled instances of expanded series are skipped.
    fn into_event(self) -> Result<Option<CalendarEvent>> {
        if self.status.as_deref() == Some("cancelled") {
            return Ok(None);
        }
        let start = self
            .start
            .ok_or_else(|| Error::Decode(format!("event {} has no start", self.id)))?;
        let end = self
            .end
            .ok_or_else(|| Error::Decode(format!("event {} has no end", self.id)))?;
        Ok(Some(CalendarEvent {
            start: start.into_event_time(&self.id)?,
            end: end.into_event_time(&self.id)?,
            id: self.id,
            summary: self.summary,
        }))
    }
}

impl GoogleEventTime {
    fn into_event_time(self, event_id: &str) -> Result<EventTime> {
        if let Some(dt) = self.date_time {
            return DateTime::parse_from_rfc3339(&dt)
                .map(EventTime::At)
                .map_err(|e| Error::Decode(format!("event {event_id} dateTime {dt}: {e}")));
        }
        if let Some(date) = self.date {
            return NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map(EventTime::AllDay)
                .map_err(|e| Error::Decode(format!("event {event_id} date {date}: {e}")));
        }
        Err(Error::Decode(format!(
            "event {event_id} has neither date nor dateTime"
        )))
    }
}

#[derive(Debug, Serialize)]
struct InsertEvent<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    description: &'a str,
    start: GoogleEventTime,
    end: GoogleEventTime,
}

impl<'a> From<&'a NewEvent> for InsertEvent<'a> {
    fn from(event: &'a NewEvent) -> Self {
        let wall_clock = |dt: chrono::NaiveDateTime| GoogleEventTime {
            date: None,
            date_time: Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            time_zone: Some(event.time_zone.clone()),
        };
        Self {
            summary: &event.summary,
            location: event.location.as_deref(),
            description: &event.description,
            start: wall_clock(event.start),
            end: wall_clock(event.end),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    html_link: Option<String>,
}
