//! Google OAuth endpoints and scopes

/// Consent screen for the authorization-code flow
pub const GOOGLE_AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/auth";

/// Token endpoint for code exchange and token refresh
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Full read/write access to calendars; event insertion needs more than readonly.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// An access token this close to expiry is treated as already expired.
pub const EXPIRY_SKEW_MILLIS: u64 = 60_000;
