//! In-process calendar backend
//!
//! Holds events in memory and applies the same window semantics as the
//! Calendar API. Inserted events become visible to later reads. A failure
//! can be armed to exercise error paths of callers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::TimeZone;
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::{CalendarBackend, CalendarEvent, CreatedEvent, EventTime, NewEvent, TimeWindow};

#[derive(Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    failure: Mutex<Option<(u16, String)>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let calendar = Self::new();
        *lock(&calendar.events) = events;
        calendar
    }

    /// Make every following call fail with an API error of the given status.
    pub fn fail_with(&self, status: u16, body: &str) {
        *lock(&self.failure) = Some((status, body.to_string()));
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        lock(&self.events).clone()
    }

    /// Number of `list_events` calls served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `insert_event` calls served.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> Result<()> {
        match lock(&self.failure).as_ref() {
            Some((status, body)) => Err(Error::Api {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }

    fn query(&self, window: TimeWindow) -> Result<Vec<CalendarEvent>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let mut matching: Vec<_> = lock(&self.events)
            .iter()
            .filter(|e| window.overlaps(e))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.start.as_utc());
        Ok(matching)
    }

    fn insert(&self, event: &NewEvent) -> Result<CreatedEvent> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let tz: Tz = event
            .time_zone
            .parse()
            .map_err(|e| Error::Decode(format!("unknown time zone {}: {e}", event.time_zone)))?;
        let to_instant = |dt: chrono::NaiveDateTime| {
            tz.from_local_datetime(&dt)
                .earliest()
                .map(|local| EventTime::At(local.fixed_offset()))
                .ok_or_else(|| Error::Decode(format!("nonexistent local time {dt}")))
        };

        let mut events = lock(&self.events);
        let id = format!("mem{}", events.len() + 1);
        events.push(CalendarEvent {
            id: id.clone(),
            summary: Some(event.summary.clone()),
            start: to_instant(event.start)?,
            end: to_instant(event.end)?,
        });
        Ok(CreatedEvent {
            html_link: Some(format!("memory://events/{id}")),
            id,
        })
    }
}

impl CalendarBackend for InMemoryCalendar {
    fn id(&self) -> &str {
        "memory"
    }

    fn list_events(
        &self,
        window: TimeWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalendarEvent>>> + Send + '_>> {
        let result = self.query(window);
        Box::pin(async move { result })
    }

    fn insert_event<'a>(
        &'a self,
        event: &'a NewEvent,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedEvent>> + Send + 'a>> {
        let result = self.insert(event);
        Box::pin(async move { result })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    fn timed(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: None,
            start: EventTime::At(DateTime::parse_from_rfc3339(start).unwrap()),
            end: EventTime::At(DateTime::parse_from_rfc3339(end).unwrap()),
        }
    }

    #[tokio::test]
    async fn lists_only_overlapping_events_in_order() {
        let calendar = InMemoryCalendar::with_events(vec![
            timed("late", "2024-06-10T15:00:00Z", "2024-06-10T16:00:00Z"),
            timed("early", "2024-06-10T09:00:00Z", "2024-06-10T10:00:00Z"),
            timed("other-day", "2024-06-11T09:00:00Z", "2024-06-11T10:00:00Z"),
        ]);
        let window = TimeWindow::new(
            "2024-06-10T00:00:00Z".parse().unwrap(),
            "2024-06-11T00:00:00Z".parse().unwrap(),
        );

        let events = calendar.list_events(window).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(calendar.reads(), 1);
    }

    #[tokio::test]
    async fn inserted_event_is_visible_to_reads() {
        let calendar = InMemoryCalendar::new();
        let day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let created = calendar
            .insert_event(&NewEvent {
                summary: "booked".into(),
                location: None,
                description: String::new(),
                start: day.and_hms_opt(9, 0, 0).unwrap(),
                end: day.and_hms_opt(10, 0, 0).unwrap(),
                time_zone: "Europe/Warsaw".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "mem1");

        let events = calendar.events();
        assert_eq!(
            events[0].start.as_utc(),
            "2024-06-10T07:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
        );
        assert_eq!(calendar.writes(), 1);
    }

    #[tokio::test]
    async fn armed_failure_is_returned() {
        let calendar = InMemoryCalendar::new();
        calendar.fail_with(503, "backend down");
        let window = TimeWindow::new(
            "2024-06-10T00:00:00Z".parse().unwrap(),
            "2024-06-11T00:00:00Z".parse().unwrap(),
        );
        assert!(matches!(
            calendar.list_events(window).await,
            Err(Error::Api { status: 503, .. })
        ));
    }
}
