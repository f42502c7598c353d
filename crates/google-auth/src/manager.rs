//! Single-writer credential manager
//!
//! The manager is the only owner of the in-memory credential. Its mutex is
//! held across a refresh, so requests that observe an expired token queue
//! behind the in-flight refresh and reuse its result instead of racing to
//! overwrite the credential file.

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::OAuthClient;
use crate::consent;
use crate::credentials::{Credential, CredentialSlot, now_millis};
use crate::error::{Error, Result};
use crate::token;

/// A bearer token valid for at least `EXPIRY_SKEW_MILLIS` at issue time.
#[derive(Debug, Clone)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: String) -> Self {
        Self(Secret::new(token))
    }

    pub fn bearer(&self) -> &str {
        self.0.expose()
    }
}

pub struct CredentialManager {
    client: OAuthClient,
    http: reqwest::Client,
    slot: CredentialSlot,
    state: Mutex<Option<Credential>>,
}

impl CredentialManager {
    /// Load the stored credential (if any) and build the manager.
    pub async fn load(
        client: OAuthClient,
        http: reqwest::Client,
        slot: CredentialSlot,
    ) -> Result<Self> {
        let credential = slot.load().await?;
        Ok(Self {
            client,
            http,
            slot,
            state: Mutex::new(credential),
        })
    }

    /// Return a usable access token, refreshing the stored credential once if
    /// it has expired.
    pub async fn resolve(&self) -> Result<AccessToken> {
        let mut state = self.state.lock().await;
        let credential = state.as_ref().ok_or(Error::AuthRequired)?;

        let now = now_millis();
        if !credential.is_expired(now) {
            return Ok(AccessToken::new(credential.access.clone()));
        }

        let Some(refresh) = credential.refresh.clone() else {
            warn!("access token expired and no refresh token is stored");
            return Err(Error::AuthRequired);
        };

        debug!("access token expired, refreshing");
        let response = match token::refresh_token(&self.http, &self.client, &refresh).await {
            Ok(response) => {
                metrics::counter!("booking_token_refresh_total", "outcome" => "success")
                    .increment(1);
                response
            }
            Err(e) => {
                metrics::counter!("booking_token_refresh_total", "outcome" => "failure")
                    .increment(1);
                warn!(error = %e, "token refresh failed");
                return Err(e);
            }
        };

        let refreshed = Credential::from_token_response(response, now, Some(refresh));
        if let Err(e) = self.slot.persist(&refreshed).await {
            warn!(error = %e, "failed to persist refreshed credential");
        }

        let access = refreshed.access.clone();
        *state = Some(refreshed);
        info!("access token refreshed");
        Ok(AccessToken::new(access))
    }

    /// Whether a credential is currently held (it may still need a refresh).
    pub async fn has_credential(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Consent-screen URL for the given `state` and PKCE challenge.
    pub fn authorization_url(&self, state: &str, challenge: &str) -> Result<String> {
        consent::build_authorization_url(&self.client, state, challenge)
    }

    /// Exchange an authorization code and replace the stored credential.
    pub async fn complete_authorization(&self, code: &str, verifier: &str) -> Result<()> {
        let response = token::exchange_code(&self.http, &self.client, code, verifier).await?;

        let mut state = self.state.lock().await;
        let previous_refresh = state.as_ref().and_then(|c| c.refresh.clone());
        if response.refresh_token.is_none() {
            warn!("token endpoint returned no refresh token; credential cannot be refreshed later");
        }
        let credential = Credential::from_token_response(response, now_millis(), previous_refresh);
        self.slot.persist(&credential).await?;
        *state = Some(credential);
        info!(path = %self.slot.path().display(), "authorization completed, credential stored");
        Ok(())
    }
}
