//! Calls to the user-supplied LLM endpoint

use super::{config::RelayConfig, error::RelayError};
use crate::config::LlmSettings;
use crate::protocol::{chat_completions_url, ChatRequest, ConnectionProbeBody, ConnectionTestResult};
use axum::{
    body::{Body, Bytes},
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::IgnoredAny;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Successful upstream reply, in the shape the caller asked for
pub enum RelayResponse {
    /// Upstream SSE body, forwarded chunk by chunk
    Stream(BoxStream<'static, reqwest::Result<Bytes>>),
    /// Complete upstream JSON body, byte-for-byte
    Buffered(Bytes),
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        match self {
            RelayResponse::Stream(stream) => (
                [
                    (header::CONTENT_TYPE, "text/event-stream"),
                    (header::CACHE_CONTROL, "no-cache"),
                    (header::HeaderName::from_static("x-accel-buffering"), "no"),
                ],
                Body::from_stream(stream),
            )
                .into_response(),
            RelayResponse::Buffered(bytes) => {
                ([(header::CONTENT_TYPE, "application/json")], Body::from(bytes)).into_response()
            }
        }
    }
}

/// Pooled HTTP client for upstream calls. Holds no per-request state.
pub struct Upstream {
    http_client: HttpClient,
    response_timeout: Duration,
}

impl Upstream {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let http_client = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self {
            http_client,
            response_timeout: config.upstream_timeout(),
        })
    }

    /// POST a JSON body with the bearer token, waiting at most
    /// `response_timeout` for the response headers.
    async fn post<T: Serialize>(
        &self,
        settings: &LlmSettings,
        body: &T,
    ) -> Result<reqwest::Response, RelayError> {
        let endpoint = chat_completions_url(&settings.base_url);
        info!("Calling LLM API: {}", endpoint);

        let send = self
            .http_client
            .post(&endpoint)
            .bearer_auth(&settings.api_key)
            .json(body)
            .send();

        tokio::time::timeout(self.response_timeout, send)
            .await
            .map_err(|_| RelayError::Timeout(self.response_timeout))?
            .map_err(RelayError::from)
    }

    /// Forward a validated chat request. Exactly one upstream call, no retry.
    pub async fn forward(&self, request: &ChatRequest) -> Result<RelayResponse, RelayError> {
        if !request.settings.is_configured() {
            return Err(RelayError::MissingConfiguration);
        }

        let response = self.post(&request.settings, &request.upstream_body()).await?;

        let status = response.status();
        if !status.is_success() {
            let details = error_body(response).await;
            warn!("LLM API error: {} - {}", status, details);
            return Err(RelayError::Upstream { status, details });
        }

        if request.stream {
            Ok(RelayResponse::Stream(response.bytes_stream().boxed()))
        } else {
            let body = response.bytes().await?;
            serde_json::from_slice::<IgnoredAny>(&body)?;
            Ok(RelayResponse::Buffered(body))
        }
    }

    /// Send a minimal completion request and describe the outcome
    pub async fn test_connection(&self, settings: &LlmSettings) -> ConnectionTestResult {
        let response = match self
            .post(settings, &ConnectionProbeBody::new(&settings.model_name))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Connection test error: {}", e);
                return ConnectionTestResult::failed(transport_failure_message(&e), None);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let details = error_body(response).await;
            warn!("Connection test failed: {} - {}", status, details);
            return ConnectionTestResult::failed(status_failure_message(status), Some(details));
        }

        match response.json::<serde_json::Value>().await {
            Ok(data) => {
                let model = data
                    .get("model")
                    .and_then(|m| m.as_str())
                    .filter(|m| !m.is_empty())
                    .unwrap_or(settings.model_name.as_str());
                info!("Connection test successful - model: {}", model);
                ConnectionTestResult::ok(model)
            }
            Err(e) => ConnectionTestResult::failed(e.to_string(), None),
        }
    }
}

/// Body of a failed upstream response. A body that cannot be read is
/// logged and reported as empty.
async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to read LLM API error body ({}): {}", status, e);
            String::new()
        }
    }
}

fn status_failure_message(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "API key is invalid or expired".to_string(),
        StatusCode::NOT_FOUND => "Endpoint URL is wrong or the model does not exist".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "Too many requests, please try again later".to_string(),
        other => format!("API returned an error ({})", other.as_u16()),
    }
}

fn transport_failure_message(err: &RelayError) -> String {
    match err {
        RelayError::Network(e) if e.is_connect() || e.is_builder() => {
            "Cannot reach the server, please check the base URL".to_string()
        }
        other => other.to_string(),
    }
}
