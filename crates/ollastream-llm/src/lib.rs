//! Ollastream LLM - Ollama chat adapter producing canonical event streams

pub mod convert;
pub mod ndjson;
pub mod ollama;
pub mod provider;
pub mod retry;
pub mod types;

pub use convert::{MessageConverter, PlainTextConverter};
pub use ollama::{classify_error, translate, OllamaProvider};
pub use provider::{ErrorKind, LlmError, LlmProvider, LlmResult, LlmStream};
pub use retry::{with_retry, RetryPolicy};
pub use types::*;
