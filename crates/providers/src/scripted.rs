//! Scripted chat backend for tests and offline demos.
//!
//! Replies are queued up front and played back one per request, in order.
//! Streaming replies are cut into small chunks so downstream consumers get
//! exercised against deltas that split words, fences, and JSON bodies at
//! arbitrary points. Every request is recorded for later assertions.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use colloquy_core::{
    BackendCapabilities, ChatBackend, ChatCompletion, ChatDelta, ChatRequest, ProviderError,
    Usage,
};

/// One queued reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Succeed with this text.
    Text(String),
    /// Fail with this error.
    Error(ProviderError),
}

/// A backend that plays back a fixed script.
pub struct ScriptedBackend {
    name: String,
    replies: Mutex<VecDeque<ScriptedReply>>,
    seen: Mutex<Vec<ChatRequest>>,
    chunk_bytes: usize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            name: "scripted".into(),
            replies: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
            chunk_bytes: 7,
        }
    }

    /// Queue a successful text reply.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(ScriptedReply::Text(text.into()));
        self
    }

    /// Queue an error reply.
    pub fn with_error(self, error: ProviderError) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(ScriptedReply::Error(error));
        self
    }

    /// Set the streaming chunk size in bytes (clamped to at least 1).
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }

    /// Every request this backend has received, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replies left in the script.
    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_reply(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(error)) => Err(error),
            None => Err(ProviderError::Unknown("script exhausted".into())),
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthetic usage so accumulation paths see nonzero numbers.
fn synthetic_usage(request: &ChatRequest, text: &str) -> Usage {
    let prompt_chars: usize = request.turns.iter().map(|t| t.content.len()).sum();
    let prompt_tokens = (prompt_chars.div_ceil(4)) as u32;
    let completion_tokens = (text.len().div_ceil(4)) as u32;
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

/// Split on char boundaries into pieces of roughly `target` bytes.
fn chunk_text(text: &str, target: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if current.len() >= target {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            streaming: true,
            max_context_tokens: 8_192,
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let text = self.next_reply(&request)?;
        let usage = synthetic_usage(&request, &text);
        Ok(ChatCompletion {
            text,
            usage: Some(usage),
        })
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ChatDelta, ProviderError>>,
        ProviderError,
    > {
        let text = self.next_reply(&request)?;
        let usage = synthetic_usage(&request, &text);
        let chunks = chunk_text(&text, self.chunk_bytes);

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Ok(ChatDelta::text(chunk))).await.is_err() {
                    return; // receiver dropped
                }
            }
            let _ = tx.send(Ok(ChatDelta::finished(Some(usage)))).await;
        });

        Ok(rx)
    }
}
