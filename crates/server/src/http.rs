//! HTTP Endpoints
//!
//! Carrier webhook, health, status and metrics.

use std::time::Duration;

use axum::{
    extract::{Form, Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, record_call_routed};
use crate::state::AppState;
use crate::websocket::media_stream;

const SERVICE_MESSAGE: &str = "The Illinois Hammer AI Intake System is running";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let incoming_path = state.settings.telephony.incoming_path.clone();
    let stream_path = state.settings.telephony.stream_path.clone();
    let timeout = Duration::from_secs(state.settings.server.timeout_seconds);

    Router::new()
        .route("/", get(health_check))
        .route("/status", get(status))
        .route("/metrics", get(metrics_handler))
        .route(&incoming_path, get(incoming_call).post(incoming_call))
        .route(&stream_path, get(media_stream))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Webhook parameters the carrier sends with each call attempt
#[derive(Debug, Default, Deserialize)]
pub struct CallParams {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

/// Decide whether a call attempt reaches the AI or a human
///
/// The call id is read from the form body first, then the query string.
async fn incoming_call(
    State(state): State<AppState>,
    Query(query): Query<CallParams>,
    form: Option<Form<CallParams>>,
) -> impl IntoResponse {
    let call_sid = form
        .and_then(|Form(params)| params.call_sid)
        .or(query.call_sid)
        .filter(|sid| !sid.is_empty());

    let route = match call_sid.as_deref() {
        Some(call_sid) => state.routing.route(call_sid),
        None => {
            tracing::warn!("Call webhook without CallSid");
            state.routing.connect()
        }
    };
    record_call_routed(route.kind());

    ([(header::CONTENT_TYPE, "text/xml")], route.to_twiml())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": SERVICE_MESSAGE,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Active calls and transfers waiting for their webhook
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let calls = state.calls.snapshot();
    let pending: Vec<serde_json::Value> = state
        .registry
        .pending()
        .into_iter()
        .map(|transfer| {
            json!({
                "callSid": transfer.call_sid,
                "ageMs": transfer.age.as_millis() as u64,
            })
        })
        .collect();

    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "activeCalls": calls.len(),
        "pendingTransfers": pending.len(),
        "activeCallDetails": calls,
        "pendingTransferDetails": pending,
    }))
}
