//! Prometheus metrics
//!
//! Installs the global recorder the agent crate's counters and histograms
//! report into, and renders it on `/metrics`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use voice_duet_agent::metrics as names;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Returns `None` if one is already
/// installed or installation failed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if HANDLE.get().is_some() {
        return None;
    }

    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            return None;
        },
    };
    describe();

    let _ = HANDLE.set(handle.clone());
    Some(handle)
}

fn describe() {
    ::metrics::describe_counter!(names::TURNS_COMPLETED, "Turns sealed into the conversation log");
    ::metrics::describe_counter!(names::TURN_ERRORS, "Endpoint errors received during a turn");
    ::metrics::describe_histogram!(
        names::TURN_DURATION,
        ::metrics::Unit::Seconds,
        "Time from turn request to seal"
    );
    ::metrics::describe_counter!(names::AUDIO_FRAGMENTS, "Audio fragments relayed");
    ::metrics::describe_counter!(names::AUDIO_BYTES, ::metrics::Unit::Bytes, "Audio bytes relayed");
    ::metrics::describe_counter!(names::SURFACE_FAILURES, "Failed presentation surface calls");
    ::metrics::describe_counter!(names::MALFORMED_MESSAGES, "Inbound messages skipped as malformed");
    ::metrics::describe_counter!(names::RUNS, "Finished conversation runs by end reason");
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    match HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
