//! Prometheus metrics exposition
//!
//! - `booking_requests_total` (counter): labels `route`, `status`
//! - `booking_request_duration_seconds` (histogram): label `route`
//! - `booking_backend_errors_total` (counter): label `kind`
//!
//! `booking_token_refresh_total{outcome}` is emitted by the credential
//! manager and rendered through the same recorder.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_BUCKETS: [f64; 12] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("booking_request_duration_seconds".to_string()),
            &DURATION_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Request durations render as a histogram (`_bucket` lines) rather than the
/// exporter's default summary. Buckets run from 5ms to the default 30s
/// outbound timeout.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request against its route template.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "booking_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("booking_request_duration_seconds", "route" => route.to_string())
        .record(duration_secs);
}

/// Record a failed calendar backend call.
pub fn record_backend_error(kind: &str) {
    metrics::counter!("booking_backend_errors_total", "kind" => kind.to_string()).increment(1);
}

#[cfg(test)]
pub(crate) fn isolated_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    PrometheusHandle,
) {
    let recorder = builder().build_recorder();
    let handle = recorder.handle();
    (recorder, handle)
}
