//! Slot generation and slot labels

use std::fmt;

use calendar_backend::CalendarEvent;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::schedule::WorkDay;

/// Separator between start and end in a slot label (EN DASH).
pub const SLOT_SEPARATOR: char = '\u{2013}';

/// Time occupied by an existing timed event, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyInterval {
    /// All-day events carry no time range and are skipped.
    pub fn from_event(event: &CalendarEvent, tz: &Tz) -> Option<Self> {
        let (start, end) = event.timed_span()?;
        Some(Self {
            start: start.with_timezone(tz).naive_local(),
            end: end.with_timezone(tz).naive_local(),
        })
    }
}

/// A `[start, end)` appointment range in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    /// Half-open overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, busy: &BusyInterval) -> bool {
        self.start < busy.end && self.end > busy.start
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Parse an `HH:MM–HH:MM` label on `date`. An EM DASH is accepted as separator too.
    pub fn parse(date: NaiveDate, label: &str) -> Result<Self> {
        let invalid = || Error::InvalidSlotFormat(label.to_string());
        let (start, end) = label
            .split_once([SLOT_SEPARATOR, '\u{2014}'])
            .ok_or_else(invalid)?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").map_err(|_| invalid())?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").map_err(|_| invalid())?;
        if end <= start {
            return Err(invalid());
        }
        Ok(Self {
            start: date.and_time(start),
            end: date.and_time(end),
        })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SLOT_SEPARATOR}{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every candidate of `duration_minutes` on `date`, in chronological order.
pub fn candidate_slots(date: NaiveDate, duration_minutes: u32, work_day: &WorkDay) -> Vec<Slot> {
    let length = Duration::minutes(i64::from(duration_minutes));
    let step = Duration::minutes(i64::from(work_day.step_minutes));
    let close = date.and_time(work_day.close);

    let mut slots = Vec::new();
    if duration_minutes == 0 || work_day.step_minutes == 0 {
        return slots;
    }
    let mut start = date.and_time(work_day.open);
    while start + length <= close {
        slots.push(Slot {
            start,
            end: start + length,
        });
        start += step;
    }
    slots
}

/// Candidates that overlap none of `busy`.
pub fn free_slots(
    date: NaiveDate,
    duration_minutes: u32,
    work_day: &WorkDay,
    busy: &[BusyInterval],
) -> Vec<Slot> {
    candidate_slots(date, duration_minutes, work_day)
        .into_iter()
        .filter(|slot| !busy.iter().any(|b| slot.overlaps(b)))
        .collect()
}
