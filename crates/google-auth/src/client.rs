//! OAuth client registration

use common::Secret;

use crate::constants::{GOOGLE_AUTHORIZE_ENDPOINT, GOOGLE_TOKEN_ENDPOINT};

/// The registered OAuth web client the service authenticates as.
///
/// Endpoints default to Google's and are only overridden in tests or when
/// pointing the service at a compatible identity provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
}

impl OAuthClient {
    pub fn new(client_id: String, client_secret: Secret<String>, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_endpoint: GOOGLE_AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoints(mut self, authorize_endpoint: String, token_endpoint: String) -> Self {
        self.authorize_endpoint = authorize_endpoint;
        self.token_endpoint = token_endpoint;
        self
    }
}
