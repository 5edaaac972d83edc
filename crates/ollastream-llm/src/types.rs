//! LLM types for requests and streaming responses

use ollastream_core::config::DEFAULT_CONTEXT_WINDOW;
use serde::{Deserialize, Serialize};

/// Canonical event produced by a provider stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    Usage(Usage),
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::TextDelta(text.into())
    }

    pub fn usage(input_tokens: u64, output_tokens: u64) -> Self {
        StreamEvent::Usage(Usage {
            input_tokens,
            output_tokens,
        })
    }
}

/// Token usage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Static metadata about a model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub max_tokens: u32,
    pub context_window: u32,
    pub supports_images: bool,
    pub supports_prompt_cache: bool,
    pub input_price: f64,
    pub output_price: f64,
    pub description: String,
}

impl ModelInfo {
    /// Defaults for a locally served model whose capabilities are unknown.
    pub fn ollama_default() -> Self {
        Self {
            max_tokens: 4096,
            context_window: DEFAULT_CONTEXT_WINDOW,
            supports_images: false,
            supports_prompt_cache: false,
            input_price: 0.0,
            output_price: 0.0,
            description: "Ollama model".to_string(),
        }
    }
}

/// Model id plus metadata, as resolved from config
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub info: ModelInfo,
}

impl ModelDescriptor {
    /// An empty id means no model was configured.
    pub fn is_resolved(&self) -> bool {
        !self.id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Wire format: POST /api/chat
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

impl OllamaMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OllamaOptions {
    pub num_ctx: u32,
}

/// One NDJSON line of a streamed chat response. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OllamaChunk {
    #[serde(default)]
    pub message: Option<OllamaChunkMessage>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OllamaChunkMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl OllamaChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Some(OllamaChunkMessage {
                content: Some(content.into()),
            }),
            ..Default::default()
        }
    }

    pub fn counts(eval_count: Option<u64>, prompt_eval_count: Option<u64>) -> Self {
        Self {
            eval_count,
            prompt_eval_count,
            ..Default::default()
        }
    }

    /// Content text, only when non-empty.
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    /// Usage, only when at least one count is present.
    pub fn usage(&self) -> Option<Usage> {
        if self.eval_count.is_none() && self.prompt_eval_count.is_none() {
            return None;
        }
        Some(Usage {
            input_tokens: self.prompt_eval_count.unwrap_or(0),
            output_tokens: self.eval_count.unwrap_or(0),
        })
    }
}
