//! HTTP request handlers for the relay

use super::{
    error::RelayError,
    upstream::{RelayResponse, Upstream},
};
use crate::config::LlmSettings;
use crate::protocol::{ChatRequest, ConnectionTestResult};
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Relay state shared across handlers
#[derive(Clone)]
pub struct RelayState {
    pub upstream: Arc<Upstream>,
}

/// Parse a JSON body regardless of its declared content type
fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::InvalidRequest(e.to_string()))
}

/// Handle `POST /chat`
pub async fn chat_handler(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<RelayResponse, RelayError> {
    let request: ChatRequest = parse_body(&body)?;
    let request_id = Uuid::new_v4();

    info!(
        %request_id,
        "Chat request - Model: {}, Messages: {}, Stream: {}",
        request.settings.model_name,
        request.messages.len(),
        request.stream
    );

    if !request.settings.is_configured() {
        info!(%request_id, "Rejected: missing {:?}", request.settings.missing_fields());
        return Err(RelayError::MissingConfiguration);
    }

    state.upstream.forward(&request).await
}

/// Handle `POST /test-connection`
pub async fn test_connection_handler(
    State(state): State<RelayState>,
    body: Bytes,
) -> (StatusCode, Json<ConnectionTestResult>) {
    let settings: LlmSettings = match parse_body(&body) {
        Ok(settings) => settings,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ConnectionTestResult::failed(e.to_string(), None)),
            )
        }
    };

    info!(
        "Testing connection - BaseURL: {}, Model: {}",
        settings.base_url, settings.model_name
    );

    if !settings.is_configured() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ConnectionTestResult::failed("Missing required fields", None)),
        );
    }

    (StatusCode::OK, Json(state.upstream.test_connection(&settings).await))
}

/// Health check handler
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Answer any `OPTIONS` request with an empty body
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Unmatched routes; `OPTIONS` still succeeds so preflights never fail
pub async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not found", "kind": "NotFound"})),
    )
        .into_response()
}
