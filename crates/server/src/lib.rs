//! Call Intake Server
//!
//! Carrier webhook routing, the media-stream WebSocket, and status,
//! health and metrics endpoints.

pub mod http;
pub mod metrics;
pub mod routing;
pub mod state;
pub mod twiml;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, record_call_routed, record_call_started};
pub use routing::{CallRoute, CallRouter};
pub use state::{ActiveCalls, AppState};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Configuration error: {0}")]
    Config(#[from] call_intake_config::ConfigError),

    /// A speech or language collaborator could not be built
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<call_intake_core::Error> for ServerError {
    fn from(err: call_intake_core::Error) -> Self {
        ServerError::Provider(err.to_string())
    }
}

impl From<call_intake_llm::LlmError> for ServerError {
    fn from(err: call_intake_llm::LlmError) -> Self {
        ServerError::Provider(err.to_string())
    }
}

impl From<ServerError> for call_intake_core::Error {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Config(e) => call_intake_core::Error::Config(e.to_string()),
            other => call_intake_core::Error::Other(other.to_string()),
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) | ServerError::WebSocket(_) => StatusCode::BAD_REQUEST,
            ServerError::Config(_)
            | ServerError::Provider(_)
            | ServerError::Metrics(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        tracing::warn!(status = %status, error = %self, "Request failed");
        (status, self.to_string()).into_response()
    }
}
