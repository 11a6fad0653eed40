//! Streaming chat relay and SSE consumer for OpenAI-compatible endpoints
mod client;
mod config;
mod message;
mod protocol;
mod sse;

#[cfg(feature = "relay")]
pub mod relay;

use std::time::Duration;
use thiserror::Error;

/// Result type for yinxue-chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for yinxue-chat operations
#[derive(Debug, Error)]
pub enum Error {
    /// Base URL, API key or model name missing from the settings
    #[error("LLM settings not configured: {0}")]
    NotConfigured(String),

    /// The LLM endpoint (or the relay on its behalf) reported a failure
    #[error("Upstream error: {message}")]
    Upstream {
        /// HTTP status, when the failure came with one
        status: Option<u16>,
        /// Human-readable message
        message: String,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local configuration error (settings file, relay URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// No complete reply within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Coarse classification of [`Error`], so callers can route configuration
/// problems to the settings screen and everything else to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConfigured,
    Upstream,
    Network,
    Cancelled,
    Timeout,
    Config,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConfigured(_) => ErrorKind::NotConfigured,
            Error::Upstream { .. } | Error::Json(_) => ErrorKind::Upstream,
            Error::Http(_) => ErrorKind::Network,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the user has to fix their settings before retrying
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotConfigured | ErrorKind::Config)
    }
}

pub use client::{
    ByteStream, ChatClient, ChatOptions, HttpTransport, RelayReply, Transport, TurnState,
};
pub use config::{ClientConfig, LlmSettings, SettingsStore};
pub use message::{Message, MessageRole};
pub use protocol::{chat_completions_url, ChatRequest, ConnectionTestResult};
pub use sse::{extract_delta, DeltaDecoder, SseBuffer, SseLine};
