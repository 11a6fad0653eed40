//! Shared test helpers: a wiremock stand-in for the upstream LLM API and
//! an in-process relay.
#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use wiremock::{
    matchers::{any, header, method, path},
    Mock, MockServer, ResponseTemplate,
};
use yinxue_chat::relay::{create_router, serve, RelayConfig, RelayState, Upstream};
use yinxue_chat::LlmSettings;

pub const API_KEY: &str = "sk-test";
pub const MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible upstream mock
pub struct UpstreamMock {
    server: MockServer,
}

impl UpstreamMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to put in [`LlmSettings`]
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub fn settings(&self) -> LlmSettings {
        LlmSettings::new(self.base_url(), API_KEY, MODEL)
    }

    fn chat_completions() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
    }

    /// Non-streaming completion answered with exactly `body`
    pub async fn mock_chat_completion_raw(&self, body: &str) {
        Self::chat_completions()
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/json"))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Non-streaming completion with the given assistant text
    pub async fn mock_chat_completion(&self, content: &str) {
        let body = serde_json::json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "created": 1234567890,
            "model": MODEL,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        self.mock_chat_completion_raw(&body.to_string()).await;
    }

    /// Streaming completion: one `data:` frame per chunk, then `[DONE]`
    pub async fn mock_chat_streaming(&self, chunks: &[&str]) {
        self.mock_sse_body(&sse_body(chunks)).await;
    }

    /// Streaming completion with a hand-written SSE body
    pub async fn mock_sse_body(&self, body: &str) {
        Self::chat_completions()
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
            )
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Any chat request fails with `status` and `body`
    pub async fn mock_error(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Fail verification if anything reaches the upstream
    pub async fn expect_no_calls(&self) {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// JSON bodies of every request received so far
    pub async fn received_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    pub async fn verify(&self) {
        self.server.verify().await;
    }
}

/// SSE body with one delta frame per chunk, terminated by `[DONE]`
pub fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let frame = serde_json::json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "created": 1234567890,
            "model": MODEL,
            "choices": [{"index": 0, "delta": {"content": chunk}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", frame));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn relay_router() -> axum::Router {
    let upstream = Upstream::new(&RelayConfig::default()).unwrap();
    create_router(RelayState {
        upstream: Arc::new(upstream),
    })
}

/// Run a relay on an ephemeral port and return its base URL
pub async fn spawn_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = RelayConfig::default();
    tokio::spawn(async move {
        serve(listener, &config).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("origin", "https://app.example.com")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn read_response(response: axum::response::Response) -> (StatusCode, HeaderMap, Bytes) {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}
