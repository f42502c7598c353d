//! OAuth token exchange and refresh
//!
//! Both operations POST a form to the client's token endpoint with different
//! grant types. Google authenticates web clients with the client secret in
//! the form body.

use serde::{Deserialize, Serialize};

use crate::client::OAuthClient;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// Google omits `refresh_token` on refresh responses; the caller keeps the
/// previous one in that case.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    client: &OAuthClient,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&client.token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose().as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    http: &reqwest::Client,
    client: &OAuthClient,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&client.token_endpoint)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // Google answers a revoked or expired grant with 400 invalid_grant
        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(Error::RefreshFailed(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}
