//! Ollama /api/chat provider with NDJSON streaming

use crate::convert::{MessageConverter, PlainTextConverter};
use crate::ndjson::{decode_chunks, ChunkError};
use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{
    ModelDescriptor, ModelInfo, OllamaChatRequest, OllamaChunk, OllamaMessage, OllamaOptions,
    StreamEvent,
};
use futures::{Stream, StreamExt};
use ollastream_core::{ChatRequest, Message, ProviderConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

pub struct OllamaProvider {
    config: ProviderConfig,
    client: OnceCell<Client>,
    converter: Arc<dyn MessageConverter>,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            converter: Arc::new(PlainTextConverter),
        }
    }

    pub fn with_converter(mut self, converter: impl MessageConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Whether the HTTP client has been built yet.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    /// Cached client, built on first use. Concurrent first calls build it
    /// once; a failed build leaves the cell empty for the next caller.
    pub async fn ensure_client(&self) -> LlmResult<&Client> {
        self.client
            .get_or_try_init(|| async { build_client(&self.config) })
            .await
    }

    /// Wire request: synthetic system message, converted conversation,
    /// streaming on, num_ctx from the context-window override.
    pub fn build_request(&self, system_prompt: &str, messages: &[Message]) -> OllamaChatRequest {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(OllamaMessage::new("system", system_prompt));
        wire.extend(self.converter.convert(messages));

        OllamaChatRequest {
            model: self.config.model_id().to_string(),
            messages: wire,
            stream: true,
            options: OllamaOptions {
                num_ctx: self.config.context_window(),
            },
        }
    }

    /// Send the request and race it against the configured timeout.
    ///
    /// When the timer wins, the pending send future is dropped, which aborts
    /// the HTTP request; nothing it might have produced is delivered. The
    /// race lasts until the request settles: a 2xx response's headers, or a
    /// fully read error body. Draining a 2xx body is not bounded.
    pub async fn launch(&self, system_prompt: &str, messages: &[Message]) -> LlmResult<Response> {
        let client = self.ensure_client().await?;
        let body = self.build_request(system_prompt, messages);
        let url = format!("{}/api/chat", self.config.base_url());
        let timeout_ms = self.config.request_timeout_ms();

        debug!(
            "Ollama request: model={} num_ctx={} url={}",
            body.model, body.options.num_ctx, url
        );

        let settle = async {
            let response = client.post(&url).json(&body).send().await?;
            check_status(response).await
        };

        tokio::select! {
            result = settle => result,
            _ = tokio::time::sleep(self.config.timeout()) => {
                warn!("Ollama request abandoned after {}ms", timeout_ms);
                Err(LlmError::Timeout { timeout_ms })
            }
        }
    }

    pub fn classify(&self, err: LlmError) -> LlmError {
        classify_error(err, self.config.request_timeout_ms())
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> ModelDescriptor {
        let mut info = ModelInfo::ollama_default();
        if self.config.num_ctx.is_some() {
            info.context_window = self.config.context_window();
        }
        ModelDescriptor {
            id: self.config.model_id().to_string(),
            info,
        }
    }

    async fn complete_stream(&self, request: ChatRequest) -> LlmResult<LlmStream> {
        let response = self
            .launch(&request.system_prompt, &request.messages)
            .await
            .map_err(|e| self.classify(e))?;

        let timeout_ms = self.config.request_timeout_ms();
        let events = translate(decode_chunks(response.bytes_stream()))
            .map(move |item| item.map_err(|e| classify_error(e, timeout_ms)));

        Ok(Box::pin(events))
    }
}

/// Pass 2xx responses through; turn anything else into [`LlmError::Upstream`]
/// once its body has been read.
async fn check_status(response: Response) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(LlmError::upstream(
        Some(status.as_u16()),
        upstream_message(&error_text, status.canonical_reason()),
    ))
}

fn build_client(config: &ProviderConfig) -> LlmResult<Client> {
    let mut headers = HeaderMap::new();
    if let Some(key) = config.api_key() {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| LlmError::Connection(format!("invalid credential: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let client = Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| {
            LlmError::Connection(format!(
                "failed to create client for {}: {}",
                config.base_url(),
                e
            ))
        })?;

    debug!("Ollama client ready for {}", config.base_url());
    Ok(client)
}

/// Prefer the `error` field of a JSON error body, then the raw body, then
/// the status reason.
fn upstream_message(body: &str, reason: Option<&str>) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    reason.unwrap_or("Unknown error").to_string()
}

/// Normalize timeouts from any source to [`LlmError::Timeout`]; log and
/// pass everything else through untouched.
pub fn classify_error(err: LlmError, timeout_ms: u64) -> LlmError {
    if err.mentions_timeout() {
        warn!("Ollama timeout: {}", err);
        return LlmError::Timeout { timeout_ms };
    }
    error!("Ollama API error (status {:?}): {}", err.status_code(), err);
    err
}

/// Map provider chunks to canonical events, in order.
///
/// A chunk yields a text delta when it carries non-empty content and,
/// independently, a usage event when either token count is present. The
/// first upstream error is yielded as [`LlmError::StreamProcessing`] and
/// ends the stream.
pub fn translate<S>(chunks: S) -> impl Stream<Item = LlmResult<StreamEvent>> + Send
where
    S: Stream<Item = Result<OllamaChunk, ChunkError>> + Send + 'static,
{
    async_stream::stream! {
        tokio::pin!(chunks);

        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(text) = chunk.content() {
                        yield Ok(StreamEvent::TextDelta(text.to_string()));
                    }
                    if let Some(usage) = chunk.usage() {
                        yield Ok(StreamEvent::Usage(usage));
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    let message = if message.trim().is_empty() {
                        "Unknown error".to_string()
                    } else {
                        message
                    };
                    yield Err(LlmError::StreamProcessing(message));
                    break;
                }
            }
        }
    }
}
