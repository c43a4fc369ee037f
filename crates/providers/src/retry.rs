//! Bounded retry with backoff around any chat backend.
//!
//! Only errors the taxonomy marks retryable (rate limits, transient
//! unavailability) are retried; auth failures, context overflow, and unknown
//! errors surface immediately. Rate-limit errors wait out the provider's
//! `retry_after` hint; everything else backs off exponentially from the base
//! delay.
//!
//! Streaming requests retry the connection phase only. Once a receiver has
//! been handed out, a mid-stream failure passes through to the consumer —
//! a partially replayed stream would duplicate deltas.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colloquy_core::{
    BackendCapabilities, ChatBackend, ChatCompletion, ChatDelta, ChatRequest, ProviderError,
};
use colloquy_config::RetryConfig;
use tracing::warn;

/// A backend decorator that retries transient failures.
pub struct RetryBackend {
    inner: Arc<dyn ChatBackend>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryBackend {
    pub fn new(inner: Arc<dyn ChatBackend>) -> Self {
        Self {
            inner,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn from_config(inner: Arc<dyn ChatBackend>, config: &RetryConfig) -> Self {
        Self::new(inner)
            .with_max_retries(config.max_retries)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
    }

    /// Retries after the first attempt. Zero disables retrying.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for(&self, error: &ProviderError, attempt: u32) -> Duration {
        match error {
            ProviderError::RateLimited { retry_after_secs } if *retry_after_secs > 0 => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.base_delay * 2u32.saturating_pow(attempt),
        }
    }

    async fn backoff(&self, error: &ProviderError, attempt: u32) {
        let delay = self.delay_for(error, attempt);
        warn!(
            backend = %self.inner.name(),
            error = %error,
            attempt = attempt + 1,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            "transient backend failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl ChatBackend for RetryBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.inner.capabilities()
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    self.backoff(&error, attempt).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<ChatDelta, ProviderError>>,
        ProviderError,
    > {
        let mut attempt = 0;
        loop {
            match self.inner.stream_chat(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    self.backoff(&error, attempt).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::{Turn, Usage};
    use std::sync::Mutex;

    /// Fails with a fixed error until `fails` calls have happened.
    struct Flaky {
        error: ProviderError,
        fails: usize,
        calls: Mutex<usize>,
    }

    impl Flaky {
        fn new(error: ProviderError, fails: usize) -> Self {
            Self {
                error,
                fails,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.fails {
                return Err(self.error.clone());
            }
            Ok(ChatCompletion {
                text: "recovered".into(),
                usage: Some(Usage::default()),
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("m", vec![Turn::user("hi")])
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let inner = Arc::new(Flaky::new(
            ProviderError::ProviderUnavailable("503".into()),
            2,
        ));
        let backend = RetryBackend::new(inner.clone()).with_max_retries(2);

        let result = backend.complete(request()).await.unwrap();
        assert_eq!(result.text, "recovered");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let inner = Arc::new(Flaky::new(
            ProviderError::ProviderUnavailable("down".into()),
            usize::MAX,
        ));
        let backend = RetryBackend::new(inner.clone()).with_max_retries(2);

        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ProviderUnavailable(_)));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_surface_immediately() {
        let inner = Arc::new(Flaky::new(
            ProviderError::AuthFailed("bad key".into()),
            usize::MAX,
        ));
        let backend = RetryBackend::new(inner.clone()).with_max_retries(5);

        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn context_too_large_is_not_retried() {
        let inner = Arc::new(Flaky::new(
            ProviderError::ContextTooLarge("9000 > 8192".into()),
            usize::MAX,
        ));
        let backend = RetryBackend::new(inner.clone());

        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ContextTooLarge(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_the_advertised_delay() {
        let inner = Arc::new(Flaky::new(
            ProviderError::RateLimited { retry_after_secs: 7 },
            1,
        ));
        let backend = RetryBackend::new(inner.clone());

        let before = tokio::time::Instant::now();
        backend.complete(request()).await.unwrap();
        let waited = before.elapsed();

        assert!(waited >= Duration::from_secs(7), "waited {waited:?}");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_connect_phase_is_retried() {
        let inner = Arc::new(Flaky::new(
            ProviderError::ProviderUnavailable("503".into()),
            1,
        ));
        let backend = RetryBackend::new(inner.clone());

        let mut rx = backend.stream_chat(request()).await.unwrap();
        let delta = rx.recv().await.unwrap().unwrap();
        assert_eq!(delta.text.as_deref(), Some("recovered"));
        assert!(delta.done);
        assert_eq!(inner.calls(), 2);
    }
}
