//! Error types for credential operations

/// Errors from OAuth credential operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable credential; visit /authorize to grant calendar access")]
    AuthRequired,

    #[error("token refresh rejected: {0}")]
    RefreshFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("invalid OAuth endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the caller has to run the consent flow again to recover.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, Error::AuthRequired | Error::RefreshFailed(_))
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
