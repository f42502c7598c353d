//! Calendar Booking Service
//!
//! Single-binary Rust service that:
//! 1. Holds the Google OAuth credential for one calendar and keeps it fresh
//! 2. Offers free days and free slots computed from the calendar's events
//! 3. Books a slot as a new calendar event

mod config;
mod error;
mod metrics;
mod oauth;
mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use availability::AvailabilityEngine;
use calendar_backend::GoogleCalendar;
use google_auth::{CredentialManager, CredentialSlot, OAuthClient};

use crate::config::Config;
use crate::oauth::PendingAuthorizations;

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<AvailabilityEngine>,
    pub(crate) credentials: Arc<CredentialManager>,
    pub(crate) pending: PendingAuthorizations,
    pub(crate) prometheus: PrometheusHandle,
    pub(crate) started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics_handler))
        .route("/authorize", get(oauth::authorize))
        .route("/oauth2callback", get(oauth::callback))
        .route("/available-days", get(routes::available_days))
        .route("/available-slots", get(routes::available_slots))
        .route("/events-count", get(routes::events_count))
        .route("/book", post(routes::book))
        .route_layer(axum::middleware::from_fn(routes::track_request))
        .layer(CorsLayer::permissive())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting calendar-booking-service");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let (config_path, explicit) = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), explicit, "loading configuration");

    let mut config = if explicit {
        Config::load(&config_path)
    } else {
        Config::load_optional(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let schedule = config.build_schedule().context("invalid schedule")?;

    info!(
        listen_addr = %config.server.listen_addr,
        calendar_id = %config.google.calendar_id,
        time_zone = schedule.time_zone.name(),
        urgency_levels = schedule.urgency.tags().count(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let client_secret = config
        .google
        .client_secret
        .take()
        .context("client secret missing after validation")?;
    let oauth_client = OAuthClient::new(
        config.google.client_id.clone(),
        client_secret,
        config.google.redirect_uri.clone(),
    )
    .with_endpoints(
        config.google.authorize_endpoint.clone(),
        config.google.token_endpoint.clone(),
    );

    let slot = CredentialSlot::new(config.google.credential_path.clone()).with_env_blob(
        config
            .google
            .token_blob
            .take()
            .map(|blob| blob.expose().clone()),
    );
    let credentials = Arc::new(
        CredentialManager::load(oauth_client, http.clone(), slot)
            .await
            .context("failed to load stored credential")?,
    );
    if !credentials.has_credential().await {
        warn!("no stored credential; visit /authorize to connect the calendar");
    }

    let backend = GoogleCalendar::new(http, config.google.calendar_id.clone(), credentials.clone())
        .with_api_base(config.google.api_base.clone());
    let engine = AvailabilityEngine::new(Arc::new(backend), schedule)
        .context("failed to build availability engine")?;

    let app_state = AppState {
        engine: Arc::new(engine),
        credentials,
        pending: PendingAuthorizations::default(),
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
