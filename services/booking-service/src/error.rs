//! Service-specific error types
//!
//! Every handler error ends up here and is rendered as `{"error": "..."}`
//! with the status below. Library errors carry no HTTP knowledge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed query parameters and request bodies.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Availability(#[from] availability::Error),

    #[error(transparent)]
    Auth(#[from] google_auth::Error),

    /// The token endpoint refused or failed the authorization-code exchange.
    #[error("authorization failed: {0}")]
    AuthorizationExchange(google_auth::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Availability(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Availability(availability::Error::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Availability(availability::Error::Backend(
                calendar_backend::Error::Auth(e),
            ))
            | ApiError::Auth(e)
                if e.requires_authorization() =>
            {
                StatusCode::UNAUTHORIZED
            }
            ApiError::AuthorizationExchange(
                google_auth::Error::TokenExchange(_) | google_auth::Error::Http(_),
            ) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Availability(availability::Error::Backend(
                calendar_backend::Error::Auth(e),
            ))
            | ApiError::Auth(e)
                if matches!(e, google_auth::Error::RefreshFailed(_)) =>
            {
                format!("{e}; visit /authorize to grant calendar access again")
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Availability(availability::Error::Backend(e)) = &self {
            metrics::record_backend_error(e.kind());
        }
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        (
            status,
            Json(serde_json::json!({ "error": self.message() })),
        )
            .into_response()
    }
}
