//! Error types for availability and booking operations

/// Errors from availability and booking operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown urgency: {0}")]
    UnknownUrgency(String),

    #[error("duration {0} minutes is not offered")]
    InvalidDuration(u32),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid slot format: {0} (expected HH:MM\u{2013}HH:MM)")]
    InvalidSlotFormat(String),

    #[error("slot {0} is outside working hours")]
    OutsideWorkingHours(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("slot {0} is already booked")]
    Conflict(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("calendar backend error: {0}")]
    Backend(#[from] calendar_backend::Error),
}

impl Error {
    /// Errors caused by the caller's input rather than the service or backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownUrgency(_)
                | Error::InvalidDuration(_)
                | Error::InvalidDate(_)
                | Error::InvalidSlotFormat(_)
                | Error::OutsideWorkingHours(_)
                | Error::MissingFields(_)
        )
    }
}

/// Result alias for availability operations.
pub type Result<T> = std::result::Result<T, Error>;
