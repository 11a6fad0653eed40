//! Wire types shared by the relay and its consumer

use super::{config::LlmSettings, message::Message};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path appended to the configured base URL for every upstream call
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Build the upstream endpoint from a user-supplied base URL.
///
/// Only a single trailing slash is stripped.
pub fn chat_completions_url(base_url: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}{}", base, CHAT_COMPLETIONS_PATH)
}

fn default_stream() -> bool {
    true
}

/// Body accepted by the relay's `/chat` endpoint
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Upstream endpoint and credentials
    #[serde(flatten)]
    pub settings: LlmSettings,

    /// Ask the upstream for an SSE stream instead of one JSON body
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Prepended as a `system` message when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    /// Create a streaming request
    pub fn new(messages: Vec<Message>, settings: LlmSettings) -> Self {
        Self {
            messages,
            settings,
            stream: true,
            system_prompt: None,
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Set the stream flag
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Messages as sent upstream: the system prompt (if any) followed by
    /// the caller's messages in their original order.
    pub fn full_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(prompt) = self.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            messages.push(Message::system(prompt));
        }
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Body for the upstream `/chat/completions` call
    pub(crate) fn upstream_body(&self) -> UpstreamChatBody {
        UpstreamChatBody {
            model: self.settings.model_name.clone(),
            messages: self.full_messages(),
            stream: self.stream,
        }
    }
}

impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("messages", &self.messages.len())
            .field("settings", &self.settings)
            .field("stream", &self.stream)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

/// OpenAI chat-completions request body
#[derive(Debug, Serialize)]
pub(crate) struct UpstreamChatBody {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// Minimal request used to probe an endpoint
#[derive(Debug, Serialize)]
pub(crate) struct ConnectionProbeBody {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

impl ConnectionProbeBody {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![Message::user("Hi")],
            max_tokens: 5,
        }
    }
}

/// Outcome of `/test-connection`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Raw upstream error body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Model name reported by the upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ConnectionTestResult {
    pub fn ok(model: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some("Connection successful".to_string()),
            error: None,
            details: None,
            model: Some(model.into()),
        }
    }

    pub fn failed(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            details,
            model: None,
        }
    }
}
