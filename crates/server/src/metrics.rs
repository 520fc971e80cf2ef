//! Observability Metrics
//!
//! Prometheus endpoint and the server-side call counters. Per-call
//! counters (turns, failures, commits) are recorded by the agent crate.

use std::sync::OnceLock;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use call_intake_agent::{telemetry, CommitReason};

use crate::state::AppState;
use crate::ServerError;

const CALLS_STARTED: &str = "intake_calls_started_total";
const CALLS_ROUTED: &str = "intake_calls_routed_total";
const ACTIVE_CALLS: &str = "intake_active_calls";
const PENDING_TRANSFERS: &str = "intake_pending_transfers";

/// Global Prometheus handle
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder
///
/// Must be called once at startup before recording any metrics.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    register_default_metrics();

    METRICS_HANDLE.get_or_init(|| handle.clone());
    Ok(handle)
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    counter!(CALLS_STARTED).absolute(0);
    counter!(CALLS_ROUTED, "route" => "connect").absolute(0);
    counter!(CALLS_ROUTED, "route" => "forward").absolute(0);
    gauge!(ACTIVE_CALLS).set(0.0);
    gauge!(PENDING_TRANSFERS).set(0.0);

    counter!(telemetry::CALLER_TURNS).absolute(0);
    counter!(telemetry::SYNTHESIS_FAILURES).absolute(0);
    counter!(telemetry::RECOGNITION_FAILURES).absolute(0);
    for reason in [
        CommitReason::MessagePlayed,
        CommitReason::FallbackTimeout,
        CommitReason::SynthesisFailure,
        CommitReason::Disconnected,
    ] {
        counter!(telemetry::TRANSFERS_COMMITTED, "reason" => reason.as_str()).absolute(0);
    }
}

pub fn record_call_started() {
    counter!(CALLS_STARTED).increment(1);
}

pub fn record_call_routed(route: &'static str) {
    counter!(CALLS_ROUTED, "route" => route).increment(1);
}

pub fn record_active_calls(count: usize) {
    gauge!(ACTIVE_CALLS).set(count as f64);
}

pub fn record_pending_transfers(count: usize) {
    gauge!(PENDING_TRANSFERS).set(count as f64);
}

/// Metrics endpoint handler
///
/// Returns Prometheus-formatted metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    record_active_calls(state.calls.len());
    record_pending_transfers(state.registry.pending().len());

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}
