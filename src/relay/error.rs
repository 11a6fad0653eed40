//! Relay errors and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing required configuration: baseUrl, apiKey, or modelName")]
    MissingConfiguration,

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    /// Non-2xx from the LLM endpoint; `details` is its body, verbatim
    #[error("LLM API error: {}", .status.as_u16())]
    Upstream { status: StatusCode, details: String },

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM API did not respond within {0:?}")]
    Timeout(Duration),

    #[error("LLM API returned invalid JSON: {0}")]
    InvalidUpstreamBody(#[from] serde_json::Error),
}

impl RelayError {
    /// Error-kind tag carried in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingConfiguration => "MissingConfiguration",
            RelayError::InvalidRequest(_) => "InvalidRequest",
            RelayError::Upstream { .. } | RelayError::InvalidUpstreamBody(_) => "UpstreamError",
            RelayError::Network(_) => "NetworkFailure",
            RelayError::Timeout(_) => "Timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingConfiguration | RelayError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::Upstream { status, .. } => *status,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Network(_) | RelayError::InvalidUpstreamBody(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let RelayError::Upstream { details, .. } = self {
            body["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}
