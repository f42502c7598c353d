//! Google OAuth credential management
//!
//! Owns the single OAuth credential the booking service uses to talk to the
//! calendar backend: the consent URL (PKCE), authorization-code exchange,
//! token refresh, and persistence of the credential file.
//!
//! Credential flow:
//! 1. `/authorize` calls `consent::generate_verifier()` + `consent::compute_challenge()`
//!    and redirects to `CredentialManager::authorization_url()`
//! 2. `/oauth2callback` calls `CredentialManager::complete_authorization()`
//! 3. Every backend call goes through `CredentialManager::resolve()`, which
//!    refreshes an expired token once and persists the result

pub mod client;
pub mod consent;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod token;

pub use client::OAuthClient;
pub use consent::{compute_challenge, generate_state, generate_verifier};
pub use constants::*;
pub use credentials::{Credential, CredentialSlot};
pub use error::{Error, Result};
pub use manager::{AccessToken, CredentialManager};
pub use token::{TokenResponse, exchange_code, refresh_token};
