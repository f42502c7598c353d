//! Availability engine
//!
//! Stateless between calls: every operation issues a fresh backend query.

use std::collections::BTreeMap;
use std::sync::Arc;

use calendar_backend::{CalendarBackend, EventTime, TimeWindow};
use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::booking::{BookingRequest, BookingResult};
use crate::error::{Error, Result};
use crate::schedule::Schedule;
use crate::slots::{self, BusyInterval, Slot};

pub struct AvailabilityEngine {
    backend: Arc<dyn CalendarBackend>,
    schedule: Schedule,
}

impl AvailabilityEngine {
    /// Validates the schedule before accepting it.
    pub fn new(backend: Arc<dyn CalendarBackend>, schedule: Schedule) -> Result<Self> {
        schedule.validate()?;
        info!(
            backend = backend.id(),
            time_zone = schedule.time_zone.name(),
            open = %schedule.work_day.open,
            close = %schedule.work_day.close,
            step_minutes = schedule.work_day.step_minutes,
            "availability engine initialized"
        );
        Ok(Self { backend, schedule })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Days in the urgency's look-ahead window holding fewer than
    /// `day_capacity` events. The window is relative to the local date of
    /// `reference`; both ends are inclusive.
    pub async fn list_free_days(
        &self,
        urgency: &str,
        reference: DateTime<Utc>,
    ) -> Result<Vec<NaiveDate>> {
        let window = self.schedule.urgency.window(urgency)?;
        let today = self.schedule.local_date(reference);
        let first = offset_day(today, window.start_days)?;
        let last = offset_day(today, window.end_days)?;

        let events = self
            .backend
            .list_events(self.schedule.days_window(first, last)?)
            .await?;

        let mut booked: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for event in &events {
            let day = match &event.start {
                EventTime::At(start) => self.schedule.local_date(start.with_timezone(&Utc)),
                EventTime::AllDay(date) => *date,
            };
            *booked.entry(day).or_default() += 1;
        }

        let free: Vec<NaiveDate> = first
            .iter_days()
            .take_while(|day| *day <= last)
            .filter(|day| booked.get(day).copied().unwrap_or(0) < self.schedule.day_capacity)
            .collect();

        debug!(
            urgency,
            %first,
            %last,
            events = events.len(),
            free = free.len(),
            "computed free days"
        );
        Ok(free)
    }

    /// Free slots of `duration_minutes` on `date`, chronological.
    pub async fn list_free_slots(&self, date: NaiveDate, duration_minutes: u32) -> Result<Vec<Slot>> {
        if !self.schedule.durations.contains(&duration_minutes) {
            return Err(Error::InvalidDuration(duration_minutes));
        }

        let work_day = &self.schedule.work_day;
        let busy = self
            .busy_intervals(self.schedule.window_on(date, work_day.open, work_day.close)?)
            .await?;
        let free = slots::free_slots(date, duration_minutes, work_day, &busy);

        debug!(
            %date,
            duration = duration_minutes,
            busy = busy.len(),
            free = free.len(),
            "computed free slots"
        );
        Ok(free)
    }

    /// Number of events between the work-day open and `count_until` on `date`.
    pub async fn events_count(&self, date: NaiveDate) -> Result<usize> {
        let window =
            self.schedule
                .window_on(date, self.schedule.work_day.open, self.schedule.count_until)?;
        let events = self.backend.list_events(window).await?;
        Ok(events.len())
    }

    /// Validate, check the slot is still free, then write one event.
    ///
    /// The conflict check and the write are not atomic: a concurrent booking
    /// between them is not detected.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingResult> {
        let booking = request.validate()?;
        let slot = booking.slot;
        self.check_offered(slot)?;

        let window = TimeWindow::new(
            self.schedule.to_utc(slot.start)?,
            self.schedule.to_utc(slot.end)?,
        );
        if self
            .busy_intervals(window)
            .await?
            .iter()
            .any(|busy| slot.overlaps(busy))
        {
            warn!(slot = %slot, date = %slot.start.date(), "slot already booked");
            return Err(Error::Conflict(format!("{} {slot}", slot.start.date())));
        }

        let event = booking.to_event(&self.schedule.urgency, self.schedule.time_zone.name());
        let created = self.backend.insert_event(&event).await?;

        info!(
            event_id = %created.id,
            date = %slot.start.date(),
            slot = %slot,
            urgency = %booking.urgency,
            override_now = booking.override_now,
            "booking created"
        );
        Ok(BookingResult {
            event_id: created.id,
            event_link: created.html_link,
        })
    }

    /// A bookable slot lies inside the work day and has an offered length.
    fn check_offered(&self, slot: Slot) -> Result<()> {
        let work_day = &self.schedule.work_day;
        if slot.start.time() < work_day.open || slot.end.time() > work_day.close {
            return Err(Error::OutsideWorkingHours(slot.to_string()));
        }
        let minutes = (slot.end - slot.start).num_minutes();
        match u32::try_from(minutes) {
            Ok(minutes) if self.schedule.durations.contains(&minutes) => Ok(()),
            _ => Err(Error::InvalidDuration(minutes.clamp(0, i64::from(u32::MAX)) as u32)),
        }
    }

    async fn busy_intervals(&self, window: TimeWindow) -> Result<Vec<BusyInterval>> {
        let events = self.backend.list_events(window).await?;
        Ok(events
            .iter()
            .filter_map(|e| BusyInterval::from_event(e, &self.schedule.time_zone))
            .collect())
    }
}

fn offset_day(today: NaiveDate, days: u32) -> Result<NaiveDate> {
    today
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| Error::InvalidDate(format!("{today} + {days} days is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::WorkDay;
    use calendar_backend::{CalendarEvent, InMemoryCalendar};

    fn timed(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.into(),
            summary: Some(id.into()),
            start: EventTime::At(DateTime::parse_from_rfc3339(start).unwrap()),
            end: EventTime::At(DateTime::parse_from_rfc3339(end).unwrap()),
        }
    }

    fn all_day(id: &str, date: &str) -> CalendarEvent {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        CalendarEvent {
            id: id.into(),
            summary: None,
            start: EventTime::AllDay(date),
            end: EventTime::AllDay(date.succ_opt().unwrap()),
        }
    }

    fn engine_with(events: Vec<CalendarEvent>) -> (AvailabilityEngine, Arc<InMemoryCalendar>) {
        let calendar = Arc::new(InMemoryCalendar::with_events(events));
        let engine = AvailabilityEngine::new(calendar.clone(), Schedule::default()).unwrap();
        (engine, calendar)
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn labels(slots: &[Slot]) -> Vec<String> {
        slots.iter().map(Slot::label).collect()
    }

    fn booking(slot: &str) -> BookingRequest {
        BookingRequest {
            date: Some("2024-06-10".into()),
            slot: Some(slot.into()),
            name: Some("Anna".into()),
            phone: Some("123".into()),
            address: Some("Street 1".into()),
            problem: Some("boiler".into()),
            urgency: Some("now".into()),
            override_now: None,
        }
    }

    #[tokio::test]
    async fn scenario_busy_ten_to_eleven() {
        let (engine, _) = engine_with(vec![timed(
            "visit",
            "2024-06-10T10:00:00+02:00",
            "2024-06-10T11:00:00+02:00",
        )]);

        let labels = labels(&engine.list_free_slots(june(10), 60).await.unwrap());
        assert!(labels.contains(&"09:00\u{2013}10:00".to_string()));
        assert!(labels.contains(&"11:00\u{2013}12:00".to_string()));
        assert!(!labels.contains(&"10:00\u{2013}11:00".to_string()));
        assert!(!labels.contains(&"09:30\u{2013}10:30".to_string()));
    }

    #[tokio::test]
    async fn busy_times_are_compared_in_local_zone() {
        // 08:00Z is 10:00 in Warsaw during summer time
        let (engine, _) = engine_with(vec![timed(
            "utc",
            "2024-06-10T08:00:00Z",
            "2024-06-10T09:00:00Z",
        )]);
        let labels = labels(&engine.list_free_slots(june(10), 60).await.unwrap());
        assert!(!labels.contains(&"10:00\u{2013}11:00".to_string()));
        assert!(labels.contains(&"08:00\u{2013}09:00".to_string()));
    }

    #[tokio::test]
    async fn empty_day_returns_full_grid_for_every_duration() {
        let (engine, _) = engine_with(vec![]);
        for duration in crate::schedule::DEFAULT_DURATIONS {
            let slots = engine.list_free_slots(june(10), duration).await.unwrap();
            assert_eq!(slots.len() as u32, (600 - duration) / 15 + 1);
        }
    }

    #[tokio::test]
    async fn all_day_events_do_not_block_slots() {
        let (engine, _) = engine_with(vec![all_day("holiday", "2024-06-10")]);
        let slots = engine.list_free_slots(june(10), 60).await.unwrap();
        assert_eq!(slots.len(), 37);
    }

    #[tokio::test]
    async fn unoffered_duration_is_rejected_without_backend_call() {
        let (engine, calendar) = engine_with(vec![]);
        assert!(matches!(
            engine.list_free_slots(june(10), 50).await,
            Err(Error::InvalidDuration(50))
        ));
        assert_eq!(calendar.reads(), 0);
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let (engine, calendar) = engine_with(vec![
            timed("a", "2024-06-10T09:15:00+02:00", "2024-06-10T09:45:00+02:00"),
            timed("b", "2024-06-10T14:00:00+02:00", "2024-06-10T16:30:00+02:00"),
        ]);
        let first = engine.list_free_slots(june(10), 45).await.unwrap();
        let second = engine.list_free_slots(june(10), 45).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calendar.reads(), 2, "no caching between calls");
    }

    #[tokio::test]
    async fn free_days_skip_booked_days() {
        // Reference: Monday 2024-06-03 09:00 local; "urgent" covers 06-04..=06-09
        let reference: DateTime<Utc> = "2024-06-03T07:00:00Z".parse().unwrap();
        let (engine, _) = engine_with(vec![
            timed("a", "2024-06-05T12:00:00+02:00", "2024-06-05T13:00:00+02:00"),
            all_day("b", "2024-06-08"),
            timed("outside", "2024-06-12T12:00:00+02:00", "2024-06-12T13:00:00+02:00"),
        ]);

        let days = engine.list_free_days("urgent", reference).await.unwrap();
        assert_eq!(days, vec![june(4), june(6), june(7), june(9)]);
    }

    #[tokio::test]
    async fn free_days_use_local_today() {
        // 22:30Z on 06-02 is already 06-03 in Warsaw
        let reference: DateTime<Utc> = "2024-06-02T22:30:00Z".parse().unwrap();
        let (engine, _) = engine_with(vec![]);
        let days = engine.list_free_days("now", reference).await.unwrap();
        assert_eq!(days, vec![june(3), june(4)]);
    }

    #[tokio::test]
    async fn day_capacity_allows_partially_booked_days() {
        let calendar = Arc::new(InMemoryCalendar::with_events(vec![
            timed("a", "2024-06-04T09:00:00+02:00", "2024-06-04T10:00:00+02:00"),
            timed("b", "2024-06-05T09:00:00+02:00", "2024-06-05T10:00:00+02:00"),
            timed("c", "2024-06-05T11:00:00+02:00", "2024-06-05T12:00:00+02:00"),
        ]));
        let schedule = Schedule {
            day_capacity: 2,
            ..Schedule::default()
        };
        let engine = AvailabilityEngine::new(calendar, schedule).unwrap();
        let reference: DateTime<Utc> = "2024-06-03T07:00:00Z".parse().unwrap();

        let days = engine.list_free_days("now", reference).await.unwrap();
        assert_eq!(days, vec![june(3), june(4)]);
        let days = engine.list_free_days("urgent", reference).await.unwrap();
        assert!(!days.contains(&june(5)));
        assert!(days.contains(&june(4)));
    }

    #[tokio::test]
    async fn unknown_urgency_is_client_error() {
        let (engine, calendar) = engine_with(vec![]);
        let err = engine
            .list_free_days("yesterday", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownUrgency(_)));
        assert!(err.is_client_error());
        assert_eq!(calendar.reads(), 0);
    }

    #[tokio::test]
    async fn events_count_covers_open_until_count_window_end() {
        let (engine, _) = engine_with(vec![
            timed("early", "2024-06-10T06:00:00+02:00", "2024-06-10T07:00:00+02:00"),
            timed("day", "2024-06-10T09:00:00+02:00", "2024-06-10T10:00:00+02:00"),
            timed("evening", "2024-06-10T20:00:00+02:00", "2024-06-10T21:00:00+02:00"),
            timed("night", "2024-06-10T22:30:00+02:00", "2024-06-10T23:00:00+02:00"),
        ]);
        assert_eq!(engine.events_count(june(10)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn booking_writes_one_event_and_blocks_the_slot() {
        let (engine, calendar) = engine_with(vec![]);
        let result = engine.book(booking("09:00\u{2013}10:00")).await.unwrap();
        assert_eq!(result.event_id, "mem1");
        assert!(result.event_link.is_some());
        assert_eq!(calendar.writes(), 1);

        let stored = &calendar.events()[0];
        assert_eq!(stored.summary.as_deref(), Some("🔴 Anna \u{2013} boiler"));
        assert_eq!(
            stored.start.as_utc(),
            "2024-06-10T07:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );

        let labels = labels(&engine.list_free_slots(june(10), 60).await.unwrap());
        assert!(!labels.contains(&"09:00\u{2013}10:00".to_string()));
        assert!(labels.contains(&"10:00\u{2013}11:00".to_string()));
    }

    #[tokio::test]
    async fn overlapping_booking_is_a_conflict() {
        let (engine, calendar) = engine_with(vec![timed(
            "existing",
            "2024-06-10T09:30:00+02:00",
            "2024-06-10T10:30:00+02:00",
        )]);
        let err = engine.book(booking("09:00\u{2013}10:00")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
        assert_eq!(calendar.writes(), 0);

        // Touching the end of the existing event is allowed
        engine.book(booking("10:30\u{2013}11:30")).await.unwrap();
        assert_eq!(calendar.writes(), 1);
    }

    #[tokio::test]
    async fn invalid_booking_never_reaches_backend() {
        let (engine, calendar) = engine_with(vec![]);
        let err = engine.book(booking("nine to ten")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSlotFormat(_)));
        assert_eq!(calendar.reads() + calendar.writes(), 0);
    }

    #[tokio::test]
    async fn slots_outside_the_offer_are_rejected() {
        let (engine, calendar) = engine_with(vec![]);

        let err = engine.book(booking("17:30\u{2013}19:00")).await.unwrap_err();
        assert!(matches!(err, Error::OutsideWorkingHours(_)), "got {err:?}");

        let err = engine.book(booking("07:00\u{2013}08:00")).await.unwrap_err();
        assert!(matches!(err, Error::OutsideWorkingHours(_)), "got {err:?}");

        let err = engine.book(booking("09:00\u{2013}09:20")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDuration(20)), "got {err:?}");
        assert!(err.is_client_error());

        assert_eq!(calendar.reads() + calendar.writes(), 0);

        // The last offered slot of the day is still bookable
        engine.book(booking("17:00\u{2013}18:00")).await.unwrap();
        assert_eq!(calendar.writes(), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_propagated() {
        let (engine, calendar) = engine_with(vec![]);
        calendar.fail_with(500, "internal");
        let err = engine.list_free_slots(june(10), 60).await.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn invalid_schedule_is_rejected_at_construction() {
        let schedule = Schedule {
            work_day: WorkDay {
                step_minutes: 0,
                ..WorkDay::default()
            },
            ..Schedule::default()
        };
        let calendar = Arc::new(InMemoryCalendar::new());
        assert!(AvailabilityEngine::new(calendar, schedule).is_err());
    }
}
