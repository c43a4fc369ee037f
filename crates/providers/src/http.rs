//! OpenAI-compatible chat backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any other endpoint exposing `/v1/chat/completions`.
//!
//! Colloquy's command grammar rides inside the answer text, so the wire
//! carries plain chat messages only; no vendor tool schema is sent, and
//! tool-result turns go back to the model as user-role content.

use async_trait::async_trait;
use colloquy_core::{
    BackendCapabilities, ChatBackend, ChatCompletion, ChatDelta, ChatRequest, ProviderError, Role,
    Turn, Usage,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible chat backend.
pub struct OpenAiChatBackend {
    name: String,
    base_url: String,
    api_key: String,
    max_context_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiChatBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_context_tokens: 128_000,
            client,
        }
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter backend (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
        .with_max_context_tokens(8_192)
    }

    /// Override the advertised context ceiling.
    pub fn with_max_context_tokens(mut self, tokens: u32) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    /// Convert turns to OpenAI API message format.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    // No tool schema on the wire; results go back in-band.
                    Role::ToolResult => "user".into(),
                },
                content: render_content(t),
            })
            .collect()
    }

    fn request_body(request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        if status == 200 {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "backend returned error");
        Err(classify_status(status, retry_after, body))
    }
}

/// Normalize an HTTP error status into the backend error taxonomy.
fn classify_status(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => {
            ProviderError::AuthFailed("invalid API key or insufficient permissions".into())
        }
        400 | 413 if mentions_context_overflow(&body) => ProviderError::ContextTooLarge(body),
        500..=599 => ProviderError::ProviderUnavailable(format!("HTTP {status}: {body}")),
        _ => ProviderError::Unknown(format!("HTTP {status}: {body}")),
    }
}

/// OpenAI-compatible servers report context overflow as a 400 with prose;
/// match the phrasings the common ones use.
fn mentions_context_overflow(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context_length_exceeded")
        || lower.contains("context length")
        || lower.contains("context window")
        || lower.contains("maximum context")
        || lower.contains("too many tokens")
}

/// Message content as sent on the wire. Attachments become a trailing
/// listing so the model knows they exist.
fn render_content(turn: &Turn) -> String {
    if turn.attachments.is_empty() {
        return turn.content.clone();
    }
    let listing: Vec<String> = turn
        .attachments
        .iter()
        .map(|a| format!("{} ({})", a.name, a.uri))
        .collect();
    format!("{}\n\n[attached: {}]", turn.content, listing.join(", "))
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            streaming: true,
            max_context_tokens: self.max_context_tokens,
        }
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(backend = %self.name, model = %request.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(format!("failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Unknown("no choices in response".into()))?;

        Ok(ChatCompletion {
            text: choice.message.content.unwrap_or_default(),
            usage: api_response.usage.map(Usage::from),
        })
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ChatDelta, ProviderError>>,
        ProviderError,
    > {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(backend = %self.name, model = %request.model, "sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let backend_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::ProviderUnavailable(format!(
                                "stream interrupted: {e}"
                            ))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    // "[DONE]" signals end of stream
                    if data == "[DONE]" {
                        let _ = tx.send(Ok(ChatDelta::finished(None))).await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first() {
                                if let Some(content) = &choice.delta.content {
                                    if !content.is_empty()
                                        && tx
                                            .send(Ok(ChatDelta::text(content.clone())))
                                            .await
                                            .is_err()
                                    {
                                        return; // receiver dropped
                                    }
                                }
                            }

                            // Usage arrives in the final chunk (stream_options)
                            if let Some(usage) = stream_resp.usage {
                                let _ = tx
                                    .send(Ok(ChatDelta::finished(Some(Usage::from(usage)))))
                                    .await;
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(
                                backend = %backend_name,
                                data = %data,
                                error = %e,
                                "ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(ChatDelta::finished(None))).await;
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiAssistantMessage,
}

#[derive(Debug, Deserialize)]
struct ApiAssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let backend = OpenAiChatBackend::openai("sk-test");
        assert_eq!(backend.name(), "openai");
        assert!(backend.base_url.contains("api.openai.com"));
        assert!(backend.capabilities().streaming);
    }

    #[test]
    fn ollama_constructor() {
        let backend = OpenAiChatBackend::ollama(None);
        assert_eq!(backend.name(), "ollama");
        assert!(backend.base_url.contains("localhost:11434"));
        assert_eq!(backend.capabilities().max_context_tokens, 8_192);
    }

    #[test]
    fn trailing_slash_trimmed() {
        let backend = OpenAiChatBackend::new("x", "http://host/v1/", "k");
        assert_eq!(backend.base_url, "http://host/v1");
    }

    #[test]
    fn turn_conversion_maps_roles() {
        let turns = vec![
            Turn::system("You are helpful"),
            Turn::user("Hello"),
            Turn::assistant("Hi"),
            Turn::tool_result("call-1", r#"{"cmd":"now","output":"noon"}"#),
        ];
        let api = OpenAiChatBackend::to_api_messages(&turns);
        assert_eq!(api.len(), 4);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[3].role, "user");
        assert!(api[3].content.contains("now"));
    }

    #[test]
    fn attachments_rendered_into_content() {
        let turn = Turn::user("see the report").with_attachment("report.pdf", "file:///tmp/report.pdf");
        let api = OpenAiChatBackend::to_api_messages(&[turn]);
        assert!(api[0].content.contains("see the report"));
        assert!(api[0].content.contains("report.pdf"));
        assert!(api[0].content.contains("file:///tmp/report.pdf"));
    }

    #[test]
    fn request_body_streaming_flags() {
        let req = ChatRequest::new("gpt-4o", vec![Turn::user("hi")]).with_max_tokens(64);
        let body = OpenAiChatBackend::request_body(&req, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("tools").is_none());
    }

    // --- Error classification tests ---

    #[test]
    fn status_429_maps_to_rate_limited() {
        let err = classify_status(429, Some(17), String::new());
        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after_secs: 17 }
        ));

        let err = classify_status(429, None, String::new());
        assert!(matches!(
            err,
            ProviderError::RateLimited { retry_after_secs: 5 }
        ));
    }

    #[test]
    fn status_401_maps_to_auth_failed() {
        assert!(matches!(
            classify_status(401, None, String::new()),
            ProviderError::AuthFailed(_)
        ));
        assert!(matches!(
            classify_status(403, None, String::new()),
            ProviderError::AuthFailed(_)
        ));
    }

    #[test]
    fn context_overflow_detected_in_400_body() {
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens","code":"context_length_exceeded"}}"#;
        assert!(matches!(
            classify_status(400, None, body.to_string()),
            ProviderError::ContextTooLarge(_)
        ));
    }

    #[test]
    fn plain_400_is_unknown() {
        let err = classify_status(400, None, "bad temperature".into());
        assert!(matches!(err, ProviderError::Unknown(_)));
    }

    #[test]
    fn server_errors_are_unavailable() {
        assert!(matches!(
            classify_status(503, None, "overloaded".into()),
            ProviderError::ProviderUnavailable(_)
        ));
        assert!(classify_status(503, None, String::new()).is_retryable());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_stream_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        let usage = Usage::from(parsed.usage.unwrap());
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "The answer."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("The answer.")
        );
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }
}
