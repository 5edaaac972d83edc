//! LLM Provider trait

use crate::types::{ModelDescriptor, StreamEvent};
use futures::Stream;
use ollastream_core::ChatRequest;
use std::pin::Pin;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
///
/// Only the message text and the optional status code cross the boundary to
/// callers, so every message names its kind.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Ollama connection error: {0}")]
    Connection(String),

    #[error("Ollama request timed out after {} seconds", seconds(.timeout_ms))]
    Timeout { timeout_ms: u64 },

    #[error("Ollama stream processing error: {0}")]
    StreamProcessing(String),

    #[error("Ollama upstream error{}: {message}", status_suffix(.status))]
    Upstream { status: Option<u16>, message: String },
}

/// Coarse error kind, used by retry policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    StreamProcessing,
    Upstream,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::Connection,
        ErrorKind::Timeout,
        ErrorKind::StreamProcessing,
        ErrorKind::Upstream,
    ];
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Connection(_) => ErrorKind::Connection,
            LlmError::Timeout { .. } => ErrorKind::Timeout,
            LlmError::StreamProcessing(_) => ErrorKind::StreamProcessing,
            LlmError::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// HTTP status reported by the service, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        LlmError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Whether the error's cause describes a timeout.
    ///
    /// Only the cause is inspected, never the prefixed display text, and
    /// "timeout" must stand alone, so hosts or models such as `timeout-box`
    /// do not count. Client construction never touches the network, so
    /// connection errors are never timeouts.
    pub fn mentions_timeout(&self) -> bool {
        match self {
            LlmError::Timeout { .. } => true,
            LlmError::Connection(_) => false,
            LlmError::StreamProcessing(cause) | LlmError::Upstream { message: cause, .. } => {
                cause_mentions_timeout(cause)
            }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::upstream(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

fn cause_mentions_timeout(cause: &str) -> bool {
    let lower = cause.to_lowercase();
    lower.contains("timed out")
        || lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .any(|word| word.trim_end_matches('.') == "timeout")
}

fn seconds(timeout_ms: &u64) -> f64 {
    *timeout_ms as f64 / 1000.0
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Effective model id and metadata. Pure and synchronous.
    fn model(&self) -> ModelDescriptor;

    /// Stream a completion as canonical events. Every error, whether it
    /// happens before the first event or mid-stream, is already classified.
    async fn complete_stream(&self, request: ChatRequest) -> LlmResult<LlmStream>;
}
