//! Booking requests and the event they become

use calendar_backend::NewEvent;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::slots::Slot;
use crate::urgency::UrgencyPolicy;

pub const DEFAULT_URGENCY: &str = "standard";

/// Booking as submitted by the caller. Every field is optional on the wire so
/// that missing ones can be reported together. Text fields also accept JSON
/// numbers (a phone number sent as `600123456`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub slot: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub problem: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub urgency: Option<String>,
    #[serde(default)]
    pub override_now: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Text {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Text>::deserialize(deserializer)?.map(|text| match text {
        Text::String(s) => s,
        Text::Unsigned(n) => n.to_string(),
        Text::Signed(n) => n.to_string(),
        Text::Float(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingResult {
    pub event_id: String,
    pub event_link: Option<String>,
}

/// A request whose fields are present and whose date and slot parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBooking {
    pub slot: Slot,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub problem: String,
    pub urgency: String,
    pub override_now: bool,
}

impl BookingRequest {
    pub fn validate(self) -> Result<ValidBooking> {
        let mut missing = Vec::new();
        let mut take = |field: &'static str, value: Option<String>| match value {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                missing.push(field);
                String::new()
            }
        };
        let date = take("date", self.date);
        let slot = take("slot", self.slot);
        let name = take("name", self.name);
        let phone = take("phone", self.phone);
        let address = take("address", self.address);
        let problem = take("problem", self.problem);
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        let date = parse_date(&date)?;
        let slot = Slot::parse(date, &slot)?;
        let urgency = self
            .urgency
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_URGENCY.to_string());

        Ok(ValidBooking {
            slot,
            name,
            phone,
            address,
            problem,
            urgency,
            override_now: self.override_now.unwrap_or(false),
        })
    }
}

impl ValidBooking {
    /// Build the event written to the calendar.
    pub fn to_event(&self, policy: &UrgencyPolicy, time_zone: &str) -> NewEvent {
        let label = policy.label(&self.urgency, self.override_now);
        let visit_type = if self.override_now {
            "IMMEDIATE (override)".to_string()
        } else {
            self.urgency.to_uppercase()
        };
        NewEvent {
            summary: format!("{label} {} \u{2013} {}", self.name, self.problem),
            location: Some(self.address.clone()),
            description: format!(
                "📞 Phone: {}\n📍 Address: {}\n🛠️ Problem: {}\n⏱️ Visit type: {label} ({visit_type})\n",
                self.phone, self.address, self.problem
            ),
            start: self.slot.start,
            end: self.slot.end,
            time_zone: time_zone.to_string(),
        }
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(format!("{value} (expected YYYY-MM-DD)")))
}
