//! Appointment availability and booking
//!
//! Turns the events of one calendar into free days and free slots inside a
//! fixed work day, and books a slot as a new event. All times are wall-clock
//! times in the schedule's single configured zone.
//!
//! Slot rule: a candidate `[start, end)` is free iff no busy interval
//! satisfies `start < busy.end && end > busy.start`. Candidates advance from
//! the work-day open in `step_minutes` increments and never extend past close.

pub mod booking;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod slots;
pub mod urgency;

pub use booking::{BookingRequest, BookingResult};
pub use engine::AvailabilityEngine;
pub use error::{Error, Result};
pub use schedule::{Schedule, WorkDay};
pub use slots::{BusyInterval, Slot};
pub use urgency::{UrgencyLevel, UrgencyPolicy, UrgencyWindow};
