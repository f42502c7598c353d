//! Work-day window, offered durations, and the service's time zone

use std::collections::BTreeSet;

use calendar_backend::TimeWindow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};
use crate::urgency::UrgencyPolicy;

pub const DEFAULT_DURATIONS: [u32; 10] = [15, 30, 45, 60, 90, 120, 150, 180, 240, 300];

/// Opening hours, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDay {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub step_minutes: u32,
}

impl WorkDay {
    pub fn length_minutes(&self) -> i64 {
        (self.close - self.open).num_minutes()
    }
}

impl Default for WorkDay {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
            close: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            step_minutes: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub time_zone: Tz,
    pub work_day: WorkDay,
    /// End of the window `events_count` looks at (it starts at `work_day.open`).
    pub count_until: NaiveTime,
    pub durations: BTreeSet<u32>,
    /// A day is offered while it holds fewer events than this.
    pub day_capacity: usize,
    pub urgency: UrgencyPolicy,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::Europe::Warsaw,
            work_day: WorkDay::default(),
            count_until: NaiveTime::from_hms_opt(22, 0, 0).expect("valid time"),
            durations: DEFAULT_DURATIONS.into_iter().collect(),
            day_capacity: 1,
            urgency: UrgencyPolicy::default(),
        }
    }
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        let wd = &self.work_day;
        if wd.open >= wd.close {
            return Err(Error::InvalidSchedule(format!(
                "work day opens at {} but closes at {}",
                wd.open, wd.close
            )));
        }
        if wd.step_minutes == 0 {
            return Err(Error::InvalidSchedule("step_minutes must be greater than 0".into()));
        }
        if self.durations.is_empty() {
            return Err(Error::InvalidSchedule("at least one duration must be offered".into()));
        }
        if let Some(bad) = self
            .durations
            .iter()
            .find(|d| **d == 0 || i64::from(**d) > wd.length_minutes())
        {
            return Err(Error::InvalidSchedule(format!(
                "duration {bad} does not fit the {}-minute work day",
                wd.length_minutes()
            )));
        }
        if self.count_until <= wd.open {
            return Err(Error::InvalidSchedule(format!(
                "count_until {} must be after the work day opens",
                self.count_until
            )));
        }
        if self.day_capacity == 0 {
            return Err(Error::InvalidSchedule("day_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve a local wall-clock time to an instant. Ambiguous times (clocks
    /// going back) map to the earlier instant; times skipped by a DST jump are
    /// rejected.
    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>> {
        self.time_zone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                Error::InvalidDate(format!("{local} does not exist in {}", self.time_zone.name()))
            })
    }

    /// Local date of an instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.time_zone).date_naive()
    }

    /// Query window from `from` to `until` (local) on `date`.
    pub fn window_on(&self, date: NaiveDate, from: NaiveTime, until: NaiveTime) -> Result<TimeWindow> {
        Ok(TimeWindow::new(
            self.to_utc(date.and_time(from))?,
            self.to_utc(date.and_time(until))?,
        ))
    }

    /// Query window covering whole local days `first..=last`.
    pub fn days_window(&self, first: NaiveDate, last: NaiveDate) -> Result<TimeWindow> {
        let after_last = last
            .succ_opt()
            .ok_or_else(|| Error::InvalidDate(format!("{last} is out of range")))?;
        Ok(TimeWindow::new(
            self.to_utc(first.and_time(NaiveTime::MIN))?,
            self.to_utc(after_last.and_time(NaiveTime::MIN))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_valid() {
        let schedule = Schedule::default();
        schedule.validate().unwrap();
        assert_eq!(schedule.work_day.length_minutes(), 600);
        assert!(schedule.durations.contains(&300));
    }

    #[test]
    fn inverted_work_day_is_rejected() {
        let schedule = Schedule {
            work_day: WorkDay {
                open: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                step_minutes: 15,
            },
            ..Schedule::default()
        };
        assert!(matches!(schedule.validate(), Err(Error::InvalidSchedule(_))));
    }

    #[test]
    fn duration_longer_than_work_day_is_rejected() {
        let mut schedule = Schedule::default();
        schedule.durations.insert(660);
        let err = schedule.validate().unwrap_err();
        assert!(err.to_string().contains("duration 660"));
    }

    #[test]
    fn zero_step_and_capacity_are_rejected() {
        let mut schedule = Schedule::default();
        schedule.work_day.step_minutes = 0;
        assert!(schedule.validate().is_err());

        let schedule = Schedule {
            day_capacity: 0,
            ..Schedule::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn local_work_day_maps_to_utc_with_summer_offset() {
        let schedule = Schedule::default();
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let window = schedule
            .window_on(date, schedule.work_day.open, schedule.work_day.close)
            .unwrap();
        assert_eq!(window.start, "2024-06-10T06:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(window.end, "2024-06-10T16:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn days_window_spans_whole_local_days() {
        let schedule = Schedule::default();
        let first = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let last = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let window = schedule.days_window(first, last).unwrap();
        assert_eq!(window.start, "2024-01-14T23:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(window.end, "2024-01-16T23:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn skipped_local_time_is_rejected() {
        let schedule = Schedule::default();
        // Clocks jump from 02:00 to 03:00 in Warsaw on 2024-03-31
        let gap = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert!(matches!(schedule.to_utc(gap), Err(Error::InvalidDate(_))));
    }
}
