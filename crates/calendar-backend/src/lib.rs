//! Calendar backend abstraction
//!
//! Defines the `CalendarBackend` trait the availability engine talks to.
//! `GoogleCalendar` implements it against the Calendar v3 REST API,
//! authorising every call through the shared `CredentialManager`;
//! `InMemoryCalendar` keeps events in process memory.

pub mod error;
pub mod google;
pub mod memory;

pub use error::{Error, Result};
pub use google::GoogleCalendar;
pub use memory::InMemoryCalendar;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Start or end of an event as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// A timed instant with the offset the backend returned
    At(DateTime<FixedOffset>),
    /// An all-day event boundary (end date is exclusive)
    AllDay(NaiveDate),
}

impl EventTime {
    /// The instant this boundary denotes, treating all-day dates as UTC midnight.
    pub fn as_utc(&self) -> DateTime<Utc> {
        match self {
            EventTime::At(dt) => dt.with_timezone(&Utc),
            EventTime::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

/// An existing event, read-only from the service's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

impl CalendarEvent {
    /// Start and end instants for timed events; `None` for all-day events.
    pub fn timed_span(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        match (&self.start, &self.end) {
            (EventTime::At(start), EventTime::At(end)) => Some((*start, *end)),
            _ => None,
        }
    }
}

/// Query window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Backend semantics: an event is listed when it overlaps the window.
    pub fn overlaps(&self, event: &CalendarEvent) -> bool {
        event.start.as_utc() < self.end && event.end.as_utc() > self.start
    }
}

/// Event to create. Start and end are wall-clock times in `time_zone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub location: Option<String>,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
}

/// Identifier and web link the backend assigned to a created event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

/// Read/write access to the one calendar the service books into.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can be held as
/// `Arc<dyn CalendarBackend>`.
pub trait CalendarBackend: Send + Sync {
    /// Identifier for logging (e.g. "google", "memory")
    fn id(&self) -> &str;

    /// Events overlapping `window`, recurring events expanded, ordered by start.
    fn list_events(
        &self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarEvent>>> + Send + '_>>;

    /// Create one event. Not idempotent: a retried call may create a duplicate.
    fn insert_event<'a>(
        &'a self,
        event: &'a NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedEvent>> + Send + 'a>>;
}
