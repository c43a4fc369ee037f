//! ChatBackend trait — the abstraction over LLM backends.
//!
//! A backend knows how to send a windowed conversation to a model and get
//! text back, either complete or as a stream of deltas. The orchestrator
//! talks to this trait only; vendor wire formats stay inside the
//! implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::turn::Turn;

/// A request sent to a chat backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "gpt-4o", "claude-sonnet-4")
    pub model: String,

    /// The windowed conversation, chronological order
    pub turns: Vec<Turn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            turns,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage information, accumulated per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Fold another round's usage into this one.
    pub fn absorb(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A complete (non-streaming) backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// The full generated text
    pub text: String,

    /// Token usage, if the backend reports it
    pub usage: Option<Usage>,
}

/// One increment of a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    /// Partial text, absent on pure control deltas
    #[serde(default)]
    pub text: Option<String>,

    /// Whether this is the final delta
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only on the final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            done: false,
            usage: None,
        }
    }

    pub fn finished(usage: Option<Usage>) -> Self {
        Self {
            text: None,
            done: true,
            usage,
        }
    }
}

/// What a backend can do, consulted when sizing windows and picking routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Whether the backend streams natively (false = deltas come from the
    /// single-shot adapter)
    pub streaming: bool,

    /// Upper bound on context tokens the backend accepts
    pub max_context_tokens: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            max_context_tokens: 8_192,
        }
    }
}

/// The core backend trait.
///
/// Every model backend implements this. The orchestrator calls
/// `stream_chat()` without knowing which backend is behind it — pure
/// polymorphism.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// What this backend supports.
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatCompletion, ProviderError>;

    /// Send a request and get a stream of deltas.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// single final delta, so non-streaming backends satisfy the streaming
    /// interface for free. Dropping the receiver cancels the stream.
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChatDelta, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(ChatDelta {
                text: Some(response.text),
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}
