//! LLM settings and client configuration
//!
//! Settings are loaded from multiple sources in priority order:
//! 1. Environment variables (YINXUE_BASE_URL, YINXUE_API_KEY, YINXUE_MODEL_NAME)
//! 2. Settings file ($YINXUE_HOME/settings.toml or ~/.yinxue/settings.toml)
//! 3. Empty values (lowest)
//!
//! Nothing in the request path reads these on its own; callers load the
//! settings once and pass them to [`crate::ChatClient`] per call.

use super::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE: &str = "settings.toml";

/// Endpoint and credentials for the upstream LLM API
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL, e.g. `https://api.openai.com/v1`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub base_url: String,

    /// Bearer token for the upstream API
    #[serde(default, deserialize_with = "null_as_empty")]
    pub api_key: String,

    /// Model to request
    #[serde(default, deserialize_with = "null_as_empty")]
    pub model_name: String,
}

/// Treat an explicit `null` like an absent field
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl LlmSettings {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_name: model_name.into(),
        }
    }

    /// Names of the settings that are empty, in wire spelling
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.base_url.is_empty() {
            missing.push("baseUrl");
        }
        if self.api_key.is_empty() {
            missing.push("apiKey");
        }
        if self.model_name.is_empty() {
            missing.push("modelName");
        }
        missing
    }

    /// Whether all three settings are present
    pub fn is_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fail with [`Error::NotConfigured`] unless all settings are present
    pub fn ensure_configured(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::NotConfigured(format!(
                "missing {}; configure the LLM API in settings first",
                missing.join(", ")
            )))
        }
    }

    /// Override fields from `YINXUE_*` variables found through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = non_empty("YINXUE_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = non_empty("YINXUE_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = non_empty("YINXUE_MODEL_NAME") {
            self.model_name = v;
        }
    }

    /// API key with everything but the last four characters masked
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.masked_api_key())
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// File-backed store for [`LlmSettings`]
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$YINXUE_HOME/settings.toml`, falling back to `~/.yinxue/settings.toml`
    pub fn default_location() -> Result<Self> {
        let dir = match std::env::var_os("YINXUE_HOME") {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?
                .join(".yinxue"),
        };
        Ok(Self::new(dir.join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file; a missing file yields empty settings
    pub fn load_file(&self) -> Result<LlmSettings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                Error::Config(format!("invalid settings file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LlmSettings::default()),
            Err(e) => Err(Error::Config(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Settings file with environment overrides applied
    pub fn load(&self) -> Result<LlmSettings> {
        let mut settings = self.load_file()?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Persist settings, creating the parent directory if needed
    pub fn save(&self, settings: &LlmSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let content = toml::to_string_pretty(settings)
            .map_err(|e| Error::Config(format!("cannot serialize settings: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {}", self.path.display(), e)))?;
        tracing::debug!("Saved LLM settings to {}", self.path.display());
        Ok(())
    }
}

/// Connection settings for reaching the relay
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay base URL, e.g. `http://127.0.0.1:8848`
    pub relay_url: String,

    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// URL of a relay endpoint such as `chat` or `test-connection`
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.relay_url.trim_end_matches('/'), name)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8848")
    }
}
