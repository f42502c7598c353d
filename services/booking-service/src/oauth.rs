//! Consent flow endpoints
//!
//! - GET /authorize      — start a PKCE flow and redirect to the consent screen
//! - GET /oauth2callback — exchange the returned code and store the credential
//!
//! The PKCE verifier lives in memory under the random `state` value that
//! the identity provider echoes back to the callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;

/// Maximum age of a pending authorization before it expires.
const PKCE_EXPIRY: Duration = Duration::from_secs(600);

/// In-memory PKCE state for an in-progress consent flow.
struct PendingFlow {
    verifier: String,
    created_at: Instant,
}

/// Consent flows started by /authorize and not yet completed.
#[derive(Clone, Default)]
pub struct PendingAuthorizations {
    flows: Arc<Mutex<HashMap<String, PendingFlow>>>,
}

impl PendingAuthorizations {
    async fn insert(&self, state: String, verifier: String) {
        let mut flows = self.flows.lock().await;
        // Lazy cleanup: remove expired entries while holding the lock
        flows.retain(|_, f| f.created_at.elapsed() < PKCE_EXPIRY);
        flows.insert(
            state,
            PendingFlow {
                verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Consume the verifier stored under `state`, if it has not expired.
    async fn take(&self, state: &str) -> Option<String> {
        let flow = self.flows.lock().await.remove(state)?;
        (flow.created_at.elapsed() < PKCE_EXPIRY).then_some(flow.verifier)
    }
}

/// GET /authorize — generate a PKCE pair and redirect to the consent screen.
pub async fn authorize(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let verifier = google_auth::generate_verifier();
    let challenge = google_auth::compute_challenge(&verifier);
    let flow_state = google_auth::generate_state();

    let url = state.credentials.authorization_url(&flow_state, &challenge)?;
    state.pending.insert(flow_state, verifier).await;

    info!("consent flow initiated");
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /oauth2callback — exchange the authorization code for a credential.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = query.error {
        return Err(ApiError::BadRequest(format!("authorization denied: {error}")));
    }
    let flow_state = query
        .state
        .ok_or_else(|| ApiError::BadRequest("missing state parameter".into()))?;
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing code parameter".into()))?;

    let verifier = state.pending.take(&flow_state).await.ok_or_else(|| {
        ApiError::BadRequest(
            "no pending authorization for this state (expired or not initiated); visit /authorize again"
                .into(),
        )
    })?;

    state
        .credentials
        .complete_authorization(&code, &verifier)
        .await
        .map_err(|e| {
            warn!(error = %e, "authorization code exchange failed");
            ApiError::AuthorizationExchange(e)
        })?;

    Ok("Authorization complete. The calendar is connected; you can close this window.")
}
