//! Consent-screen URL with PKCE (RFC 7636)
//!
//! The verifier stays in the service's memory between `/authorize` and
//! `/oauth2callback`; only the S256 challenge travels through the browser.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::client::OAuthClient;
use crate::constants::CALENDAR_SCOPE;
use crate::error::{Error, Result};

/// Generate a random PKCE code verifier (64 bytes, URL-safe base64).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate the opaque `state` value correlating a consent redirect with its callback.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the consent URL.
///
/// Requests offline access with a forced consent prompt so Google always
/// returns a refresh token, even for a user who granted access before.
pub fn build_authorization_url(client: &OAuthClient, state: &str, challenge: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &client.authorize_endpoint,
        &[
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("include_granted_scopes", "true"),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", client.authorize_endpoint)))?;
    Ok(url.into())
}
