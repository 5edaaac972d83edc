//! Conversion from caller messages to Ollama wire messages

use crate::types::OllamaMessage;
use ollastream_core::Message;

/// Turns the caller's conversation into provider-shaped messages.
///
/// The provider prepends its own system message; converters only handle the
/// conversation itself.
pub trait MessageConverter: Send + Sync {
    fn convert(&self, messages: &[Message]) -> Vec<OllamaMessage>;
}

/// One wire message per caller message, role name and text unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextConverter;

impl MessageConverter for PlainTextConverter {
    fn convert(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage::new(m.role.as_str(), m.content.clone()))
            .collect()
    }
}
