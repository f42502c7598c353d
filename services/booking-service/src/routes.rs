//! Booking API handlers

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use availability::BookingRequest;
use availability::booking::{DEFAULT_URGENCY, parse_date};
use chrono::Utc;
use serde::Deserialize;
use tracing::{Instrument, info, info_span};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics;

const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Give every routed request an id and a span, and record its metrics.
pub async fn track_request(request: Request, next: Next) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".into());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        route = %route,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    metrics::record_request(&route, status, elapsed.as_secs_f64());
    span.in_scope(|| {
        info!(
            status,
            latency_ms = elapsed.as_millis() as u64,
            "request completed"
        )
    });
    response
}

/// GET / — liveness string.
pub async fn index() -> &'static str {
    "Calendar booking service is running"
}

/// GET /health — 200 while a credential is held, 503 until /authorize has
/// been completed.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let credential = state.credentials.has_credential().await;
    let (status_code, status) = if credential {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unauthorized")
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "credential": credential,
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// GET /metrics — Prometheus text exposition format.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    urgency: Option<String>,
}

/// GET /available-days?urgency=<tag>
pub async fn available_days(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let urgency = query
        .urgency
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_URGENCY.to_string());
    let days = state.engine.list_free_days(&urgency, Utc::now()).await?;
    Ok(Json(serde_json::json!({ "available_days": days })))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    date: Option<String>,
    duration: Option<String>,
}

/// GET /available-slots?date=YYYY-MM-DD&duration=<minutes>
pub async fn available_slots(
    State(state): State<AppState>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&required(query.date, "date")?)?;
    let duration = match query.duration.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_DURATION_MINUTES,
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::BadRequest(format!("duration must be a whole number of minutes, got: {raw}"))
        })?,
    };

    let slots = state.engine.list_free_slots(date, duration).await?;
    Ok(Json(serde_json::json!({ "free_slots": slots })))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: Option<String>,
}

/// GET /events-count?date=YYYY-MM-DD
pub async fn events_count(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&required(query.date, "date")?)?;
    let count = state.engine.events_count(date).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// POST /book
pub async fn book(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let result = state.engine.book(request).await?;
    Ok(Json(serde_json::json!({
        "status": "booked",
        "event_id": result.event_id,
        "event_link": result.event_link,
    })))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}
