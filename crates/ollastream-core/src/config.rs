//! Provider config - serde structs for ~/.ollastream/config.json
//!
//! Pure types and parsing only. Every field is optional; the accessors below
//! resolve the defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_CONTEXT_WINDOW: u32 = 32_768;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

pub const ENV_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_API_KEY: &str = "OLLAMA_API_KEY";
pub const ENV_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_NUM_CTX: &str = "OLLAMA_NUM_CTX";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "OLLAMA_REQUEST_TIMEOUT_MS";

/// Connection and model settings for one provider instance.
///
/// Immutable once handed to a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(rename = "modelId")]
    pub model_id: Option<String>,
    /// Context-window override, kept as text the way users write it.
    #[serde(rename = "numCtx")]
    pub num_ctx: Option<String>,
    #[serde(rename = "requestTimeoutMs")]
    pub request_timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Load from a specific path. Missing files and bad JSON are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Discover from ~/.ollastream/config.json, falling back to defaults.
    pub fn discover() -> Self {
        let path = Self::default_path();
        match Self::load(&path) {
            Ok(config) => config,
            Err(Error::IoError(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Default path: ~/.ollastream/config.json
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".ollastream").join("config.json")
    }

    /// Apply OLLAMA_* environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_BASE_URL) {
            self.base_url = Some(v);
        }
        if let Some(v) = get(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = get(ENV_MODEL) {
            self.model_id = Some(v);
        }
        if let Some(v) = get(ENV_NUM_CTX) {
            self.num_ctx = Some(v);
        }
        if let Some(v) = get(ENV_REQUEST_TIMEOUT_MS) {
            match v.trim().parse() {
                Ok(ms) => self.request_timeout_ms = Some(ms),
                Err(_) => tracing::warn!("{}={:?} is not a number of milliseconds", ENV_REQUEST_TIMEOUT_MS, v),
            }
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_id = Some(model.into());
        self
    }

    pub fn with_num_ctx(mut self, num_ctx: impl Into<String>) -> Self {
        self.num_ctx = Some(num_ctx.into());
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    /// Base address without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    /// Non-empty credential, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Configured model id, or "" when unset.
    pub fn model_id(&self) -> &str {
        self.model_id.as_deref().unwrap_or("")
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms())
    }

    /// Effective context window: the parsed override, or the default.
    pub fn context_window(&self) -> u32 {
        parse_context_window(self.num_ctx.as_deref())
    }
}

/// Parse a context-window override.
///
/// Reads the leading decimal digits, so "8192 tokens" is 8192. Anything that
/// yields no digits, zero, or overflows is replaced by [`DEFAULT_CONTEXT_WINDOW`].
pub fn parse_context_window(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_CONTEXT_WINDOW;
    };
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_CONTEXT_WINDOW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_numbers() {
        assert_eq!(parse_context_window(Some("8192")), 8192);
        assert_eq!(parse_context_window(Some(" 4096 ")), 4096);
        assert_eq!(parse_context_window(Some("16384 tokens")), 16384);
        assert_eq!(parse_context_window(Some("+2048")), 2048);
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_context_window(None), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(parse_context_window(Some("")), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(parse_context_window(Some("abc")), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(parse_context_window(Some("0")), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(parse_context_window(Some("-5")), DEFAULT_CONTEXT_WINDOW);
        assert_eq!(parse_context_window(Some("99999999999")), DEFAULT_CONTEXT_WINDOW);
    }
}
