//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file
//! itself is chosen by CLI `--config`, then `CONFIG_PATH`, then the default
//! `booking-service.toml` (which may be absent).
//! The OAuth client secret comes from GOOGLE_CLIENT_SECRET or
//! client_secret_file, never from the TOML directly.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use availability::urgency::{UrgencyLevel, UrgencyPolicy, UrgencyWindow, default_levels};
use availability::{Schedule, WorkDay, schedule::DEFAULT_DURATIONS};
use calendar_backend::google::GOOGLE_CALENDAR_API;
use chrono::NaiveTime;
use chrono_tz::Tz;
use common::Secret;
use google_auth::{GOOGLE_AUTHORIZE_ENDPOINT, GOOGLE_TOKEN_ENDPOINT};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "booking-service.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Replaces the built-in urgency table when non-empty.
    #[serde(default)]
    pub urgency: BTreeMap<String, UrgencyConfig>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Timeout for every outbound call (token endpoint and Calendar API).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// OAuth client and target calendar
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to GOOGLE_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,
    /// Base64 credential from GOOGLE_TOKEN_B64; preferred over the file on load.
    #[serde(skip)]
    pub token_blob: Option<Secret<String>>,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Work day, offered durations and display labels
#[derive(Debug, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_open")]
    pub open: String,
    #[serde(default = "default_close")]
    pub close: String,
    #[serde(default = "default_count_until")]
    pub count_until: String,
    #[serde(default = "default_step")]
    pub step_minutes: u32,
    #[serde(default = "default_durations")]
    pub durations: Vec<u32>,
    #[serde(default = "default_day_capacity")]
    pub day_capacity: usize,
    #[serde(default = "default_label")]
    pub default_label: String,
    #[serde(default = "default_override_label")]
    pub override_label: String,
}

/// One `[urgency.<tag>]` table
#[derive(Debug, Clone, Deserialize)]
pub struct UrgencyConfig {
    pub start_days: u32,
    pub end_days: u32,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_calendar_id() -> String {
    "primary".into()
}

fn default_credential_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_authorize_endpoint() -> String {
    GOOGLE_AUTHORIZE_ENDPOINT.into()
}

fn default_token_endpoint() -> String {
    GOOGLE_TOKEN_ENDPOINT.into()
}

fn default_api_base() -> String {
    GOOGLE_CALENDAR_API.into()
}

fn default_time_zone() -> String {
    "Europe/Warsaw".into()
}

fn default_open() -> String {
    "08:00".into()
}

fn default_close() -> String {
    "18:00".into()
}

fn default_count_until() -> String {
    "22:00".into()
}

fn default_step() -> u32 {
    15
}

fn default_durations() -> Vec<u32> {
    DEFAULT_DURATIONS.to_vec()
}

fn default_day_capacity() -> usize {
    1
}

fn default_label() -> String {
    "🟢".into()
}

fn default_override_label() -> String {
    "🔺".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            redirect_uri: String::new(),
            calendar_id: default_calendar_id(),
            credential_path: default_credential_path(),
            token_blob: None,
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            api_base: default_api_base(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            open: default_open(),
            close: default_close(),
            count_until: default_count_until(),
            step_minutes: default_step(),
            durations: default_durations(),
            day_capacity: default_day_capacity(),
            default_label: default_label(),
            override_label: default_override_label(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. GOOGLE_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Like [`Config::load`], but a missing file yields the defaults plus the
    /// environment overlay.
    pub fn load_optional(path: &Path) -> common::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::from_toml(""),
            Err(e) => Err(e.into()),
        }
    }

    fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        let google = &mut self.google;
        if let Some(id) = non_blank_env("GOOGLE_CLIENT_ID") {
            google.client_id = id;
        }
        if let Some(calendar_id) = non_blank_env("GOOGLE_CALENDAR_ID") {
            google.calendar_id = calendar_id;
        }
        if let Some(uri) = non_blank_env("GOOGLE_REDIRECT_URI") {
            google.redirect_uri = uri;
        }
        google.token_blob = non_blank_env("GOOGLE_TOKEN_B64").map(Secret::new);

        // Resolve client secret: env var takes precedence over file
        if let Some(secret) = non_blank_env("GOOGLE_CLIENT_SECRET") {
            google.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = google.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                google.client_secret = Some(Secret::new(secret));
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port.trim().parse().map_err(|_| common::Error::Env {
                name: "PORT".into(),
                reason: format!("not a valid port number: {port}"),
            })?;
            self.server.listen_addr.set_port(port);
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if self.google.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "google.client_id is required (or set GOOGLE_CLIENT_ID)".into(),
            ));
        }
        if self.google.client_secret.as_ref().is_none_or(Secret::is_blank) {
            return Err(common::Error::Config(
                "client secret is required: set GOOGLE_CLIENT_SECRET or google.client_secret_file"
                    .into(),
            ));
        }
        if !is_http_url(&self.google.redirect_uri) {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {:?}",
                self.google.redirect_uri
            )));
        }
        for (name, url) in [
            ("authorize_endpoint", &self.google.authorize_endpoint),
            ("token_endpoint", &self.google.token_endpoint),
            ("api_base", &self.google.api_base),
        ] {
            if !is_http_url(url) {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }
        if self.google.calendar_id.trim().is_empty() {
            return Err(common::Error::Config("calendar_id must not be empty".into()));
        }

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        self.build_schedule().map(|_| ())
    }

    /// Build the validated availability schedule from `[schedule]` and
    /// `[urgency.*]`.
    pub fn build_schedule(&self) -> common::Result<Schedule> {
        let s = &self.schedule;
        let time_zone: Tz = s.time_zone.parse().map_err(|_| {
            common::Error::Config(format!("unknown time_zone: {}", s.time_zone))
        })?;

        let levels = if self.urgency.is_empty() {
            default_levels()
        } else {
            self.urgency
                .iter()
                .map(|(tag, u)| {
                    let level = UrgencyLevel {
                        window: UrgencyWindow {
                            start_days: u.start_days,
                            end_days: u.end_days,
                        },
                        label: u.label.clone(),
                        aliases: u.aliases.clone(),
                    };
                    (tag.clone(), level)
                })
                .collect()
        };
        let urgency =
            UrgencyPolicy::new(levels, s.default_label.clone(), s.override_label.clone())
                .map_err(|e| common::Error::Config(e.to_string()))?;

        let schedule = Schedule {
            time_zone,
            work_day: WorkDay {
                open: parse_time("open", &s.open)?,
                close: parse_time("close", &s.close)?,
                step_minutes: s.step_minutes,
            },
            count_until: parse_time("count_until", &s.count_until)?,
            durations: s.durations.iter().copied().collect(),
            day_capacity: s.day_capacity,
            urgency,
        };
        schedule
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;
        Ok(schedule)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag is `true` when the path was named explicitly and must exist.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_PATH), false)
    }
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_time(field: &str, value: &str) -> common::Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        common::Error::Config(format!("schedule.{field} must be HH:MM, got: {value}"))
    })
}
