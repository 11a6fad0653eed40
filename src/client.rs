//! Relay client: sends one conversation turn and decodes the streamed reply

use super::{
    config::{ClientConfig, LlmSettings},
    message::Message,
    protocol::{ChatRequest, ConnectionTestResult},
    sse::DeltaDecoder,
    Error, Result,
};
use futures::stream::{Stream, StreamExt};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Response body chunks as they arrive from the relay
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// What the relay sent back for a chat request
pub enum RelayReply {
    /// Incrementally readable event stream
    Stream(ByteStream),
    /// A single JSON body, used when no streaming reader is available
    Buffered(Value),
}

impl fmt::Debug for RelayReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayReply::Stream(_) => f.write_str("RelayReply::Stream(..)"),
            RelayReply::Buffered(body) => f.debug_tuple("RelayReply::Buffered").field(body).finish(),
        }
    }
}

/// Trait for reaching the relay
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send a chat request and return the reply body
    async fn send_chat(&self, request: &ChatRequest) -> Result<RelayReply>;

    /// Ask the relay to probe the upstream endpoint
    async fn test_connection(&self, settings: &LlmSettings) -> Result<ConnectionTestResult>;
}

/// Error body produced by the relay
#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP transport to a running relay
pub struct HttpTransport {
    config: ClientConfig,
    http_client: HttpClient,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        if !config.relay_url.starts_with("http://") && !config.relay_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "relay URL must start with http:// or https://: {}",
                config.relay_url
            )));
        }
        let http_client = HttpClient::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Turn a non-2xx relay response into an error
    async fn relay_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let text = response.text().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read relay error body: {}", e);
            String::new()
        });
        let body = serde_json::from_str::<RelayErrorBody>(&text).ok();

        let (message, kind, details) = match body {
            Some(body) => (
                body.error.map(|e| error_message(&e)),
                body.kind,
                body.details,
            ),
            None => (None, None, None),
        };
        let message = message.unwrap_or_else(|| format!("relay returned {}", status));

        if kind.as_deref() == Some("MissingConfiguration") {
            return Error::NotConfigured(message);
        }
        let message = match details.filter(|d| !d.is_empty()) {
            Some(details) => format!("{}: {}", message, details),
            None => message,
        };
        Error::Upstream {
            status: Some(status.as_u16()),
            message,
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send_chat(&self, request: &ChatRequest) -> Result<RelayReply> {
        let response = self
            .http_client
            .post(self.config.endpoint("chat"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::relay_error(response).await);
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        if is_event_stream {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from));
            Ok(RelayReply::Stream(Box::pin(stream)))
        } else {
            let body = response.bytes().await?;
            Ok(RelayReply::Buffered(serde_json::from_slice(&body)?))
        }
    }

    async fn test_connection(&self, settings: &LlmSettings) -> Result<ConnectionTestResult> {
        let response = self
            .http_client
            .post(self.config.endpoint("test-connection"))
            .json(settings)
            .send()
            .await?;
        // failures are reported in the body, including the 400 for missing fields
        Ok(response.json().await?)
    }
}

/// Per-call lifecycle of a conversation turn.
///
/// `Idle` is the state before a call and after it settles; it is the
/// [`Default`] for callers tracking the current state and is never passed
/// to `on_state`. Every call reports `Sending` first and ends with exactly
/// one of `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

/// Callback receiving each text delta
pub type DeltaHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback receiving state transitions
pub type StateHook = Arc<dyn Fn(TurnState) + Send + Sync>;

/// Behaviour shared by every call made through one [`ChatClient`]
#[derive(Clone, Default)]
pub struct ChatOptions {
    /// Prepended by the relay as a `system` message
    pub system_prompt: Option<String>,

    /// Invoked with every delta, after the per-call callback
    pub on_delta: Option<DeltaHook>,

    /// Invoked on every state transition
    pub on_state: Option<StateHook>,

    /// Upper bound for a whole turn, from send to end of stream
    pub timeout: Option<Duration>,
}

impl ChatOptions {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_delta(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_delta = Some(Arc::new(hook));
        self
    }

    pub fn on_state(mut self, hook: impl Fn(TurnState) + Send + Sync + 'static) -> Self {
        self.on_state = Some(Arc::new(hook));
        self
    }
}

/// Sends conversation turns to the relay.
///
/// Holds no settings of its own: every call receives the [`LlmSettings`]
/// to use, so concurrent turns never share mutable state.
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    options: ChatOptions,
}

impl ChatClient {
    /// Create a client talking HTTP to the relay
    pub fn new(config: ClientConfig, options: ChatOptions) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?), options))
    }

    /// Create a client over any transport
    pub fn with_transport(transport: Arc<dyn Transport>, options: ChatOptions) -> Self {
        Self { transport, options }
    }

    /// Send a turn and return the complete reply
    pub async fn send_message(&self, messages: &[Message], settings: &LlmSettings) -> Result<String> {
        self.stream_message(messages, settings, |_| {}, &CancellationToken::new())
            .await
    }

    /// Send a turn, calling `on_delta` with each text fragment as it arrives.
    ///
    /// Cancelling `cancel` aborts the in-flight request or read with
    /// [`Error::Cancelled`]. On any failure the partial reply is dropped.
    pub async fn stream_message<F>(
        &self,
        messages: &[Message],
        settings: &LlmSettings,
        mut on_delta: F,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        settings.ensure_configured()?;

        let request = ChatRequest::new(messages.to_vec(), settings.clone())
            .with_system_prompt(self.options.system_prompt.clone());

        tracing::info!(
            "Chat turn - model: {}, messages: {}",
            settings.model_name,
            messages.len()
        );
        self.report(TurnState::Sending);

        let turn = self.run_turn(&request, &mut on_delta);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = with_timeout(self.options.timeout, turn) => result,
        };

        match &outcome {
            Ok(content) => {
                tracing::debug!("Chat turn completed ({} chars)", content.chars().count());
                self.report(TurnState::Completed);
            }
            Err(e) => {
                tracing::warn!("Chat turn failed: {}", e);
                self.report(TurnState::Failed);
            }
        }
        outcome
    }

    /// Probe the upstream endpoint through the relay
    pub async fn test_connection(&self, settings: &LlmSettings) -> Result<ConnectionTestResult> {
        settings.ensure_configured()?;
        self.transport.test_connection(settings).await
    }

    async fn run_turn<F>(&self, request: &ChatRequest, on_delta: &mut F) -> Result<String>
    where
        F: FnMut(&str) + Send,
    {
        let mut stream = match self.transport.send_chat(request).await? {
            RelayReply::Buffered(body) => return buffered_content(&body),
            RelayReply::Stream(stream) => stream,
        };

        let mut decoder = DeltaDecoder::new();
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            for delta in decoder.feed(&chunk?) {
                if content.is_empty() {
                    self.report(TurnState::Streaming);
                }
                content.push_str(&delta);
                on_delta(&delta);
                if let Some(hook) = &self.options.on_delta {
                    hook(&delta);
                }
            }
        }

        decoder.finish();
        Ok(content)
    }

    fn report(&self, state: TurnState) {
        tracing::debug!("Turn state: {:?}", state);
        if let Some(hook) = &self.options.on_state {
            hook(state);
        }
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => fut.await,
    }
}

/// Render an `error` field that may be a string or an object
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Assistant text from a buffered chat-completions body
fn buffered_content(body: &Value) -> Result<String> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        return Err(Error::Upstream {
            status: None,
            message: error_message(error),
        });
    }
    Ok(body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}
