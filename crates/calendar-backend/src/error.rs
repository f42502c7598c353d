//! Error types for calendar backend calls

/// Errors from calendar backend operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] google_auth::Error),

    #[error("calendar request failed: {0}")]
    Http(String),

    #[error("calendar API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid calendar response: {0}")]
    Decode(String),
}

impl Error {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Auth(_) => "auth",
            Error::Http(_) => "http",
            Error::Api { .. } => "api",
            Error::Decode(_) => "decode",
        }
    }
}

/// Result alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
