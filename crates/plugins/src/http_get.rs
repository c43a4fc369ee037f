//! `http_get` — fetch a URL and return status plus body text.

use std::time::Duration;

use async_trait::async_trait;
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor, SideEffect};
use colloquy_core::error::CommandError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Response body cap. Bodies past this are cut off and marked truncated.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

pub struct HttpGetExecutor {
    client: reqwest::Client,
}

impl HttpGetExecutor {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("colloquy/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for HttpGetExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for HttpGetExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new(
            "http_get",
            "Fetch a URL over HTTP GET and return the response status and body text.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch. Must start with http:// or https://."
                }
            },
            "required": ["url"]
        }))
        .with_timeout_secs(30)
        .with_side_effect(SideEffect::Network)
    }

    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let url = params["url"]
            .as_str()
            .ok_or_else(|| CommandError::InvalidArguments {
                command: "http_get".into(),
                reason: "missing 'url'".into(),
            })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CommandError::InvalidArguments {
                command: "http_get".into(),
                reason: "URL must start with http:// or https://".into(),
            });
        }

        debug!(url = %url, "fetching URL");

        let fetch = async {
            let mut response =
                self.client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| CommandError::ExecutorFailure {
                        command: "http_get".into(),
                        reason: format!("request failed: {e}"),
                    })?;

            let status = response.status();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();

            let mut body: Vec<u8> = Vec::new();
            let mut truncated = false;
            while let Some(chunk) =
                response
                    .chunk()
                    .await
                    .map_err(|e| CommandError::ExecutorFailure {
                        command: "http_get".into(),
                        reason: format!("failed to read body: {e}"),
                    })?
            {
                if body.len() + chunk.len() > MAX_BODY_BYTES {
                    body.extend_from_slice(&chunk[..MAX_BODY_BYTES - body.len()]);
                    truncated = true;
                    break;
                }
                body.extend_from_slice(&chunk);
            }

            Ok((status, content_type, body, truncated))
        };

        let (status, content_type, body, truncated) = tokio::select! {
            fetched = fetch => fetched?,
            _ = cancel.cancelled() => return Err(CommandError::Cancelled),
        };

        let mut text = format!(
            "HTTP {status}\ncontent-type: {content_type}\n\n{}",
            String::from_utf8_lossy(&body)
        );
        if truncated {
            text.push_str("\n[body truncated]");
        }

        Ok(CommandOutput::text(text).with_data(serde_json::json!({
            "status": status.as_u16(),
            "content_type": content_type,
            "bytes": body.len(),
            "truncated": truncated,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_shape() {
        let executor = HttpGetExecutor::new();
        let desc = executor.descriptor();
        assert_eq!(desc.name, "http_get");
        assert_eq!(desc.side_effect, SideEffect::Network);
        assert_eq!(desc.params_schema["required"], serde_json::json!(["url"]));
    }

    #[tokio::test]
    async fn missing_url_rejected() {
        let executor = HttpGetExecutor::new();
        let result = executor
            .run(serde_json::json!({}), CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(CommandError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn non_http_scheme_rejected() {
        let executor = HttpGetExecutor::new();
        let result = executor
            .run(
                serde_json::json!({ "url": "ftp://files.example.com" }),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(CommandError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let executor = HttpGetExecutor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // The cancelled branch wins before any connection is attempted.
        let result = executor
            .run(
                serde_json::json!({ "url": "http://192.0.2.1/unreachable" }),
                cancel,
            )
            .await;
        assert!(matches!(
            result,
            Err(CommandError::Cancelled) | Err(CommandError::ExecutorFailure { .. })
        ));
    }
}
