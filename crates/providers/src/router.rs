//! Backend router — selects the chat backend named by config.
//!
//! Built once at startup from [`AppConfig`]; every configured backend is
//! wrapped in retry-with-backoff before registration.
//!
//! [`AppConfig`]: colloquy_config::AppConfig

use std::collections::HashMap;
use std::sync::Arc;

use colloquy_config::AppConfig;
use colloquy_core::ChatBackend;
use tracing::warn;

use crate::http::OpenAiChatBackend;
use crate::retry::RetryBackend;

/// Routes chat requests to the named backend.
pub struct BackendRouter {
    backends: HashMap<String, Arc<dyn ChatBackend>>,
    default_backend: String,
}

impl BackendRouter {
    /// Create a new router with a default backend name.
    pub fn new(default_backend: impl Into<String>) -> Self {
        Self {
            backends: HashMap::new(),
            default_backend: default_backend.into(),
        }
    }

    /// Register a backend under a name. Last registration wins.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn ChatBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Get the default backend.
    pub fn default_backend(&self) -> Option<Arc<dyn ChatBackend>> {
        self.backends.get(&self.default_backend).cloned()
    }

    /// Get a specific backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatBackend>> {
        self.backends.get(name).cloned()
    }

    /// Resolve a backend: the named one, or the default when `None`.
    pub fn resolve(&self, name: Option<&str>) -> Option<Arc<dyn ChatBackend>> {
        match name {
            Some(name) => self.get(name),
            None => self.default_backend(),
        }
    }

    /// All registered backend names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build the router from configuration. Each backend gets the global retry
/// policy; backends with no known base URL are skipped with a warning.
pub fn build_from_config(config: &AppConfig) -> BackendRouter {
    let mut router = BackendRouter::new(&config.default_backend);

    for (name, backend_config) in &config.backends {
        let api_key = backend_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let Some(base_url) = backend_config
            .base_url
            .clone()
            .or_else(|| default_base_url(name))
        else {
            warn!(backend = %name, "no base_url configured and none known, skipping");
            continue;
        };

        let backend = OpenAiChatBackend::new(name, base_url, api_key);
        router.register(
            name.clone(),
            Arc::new(RetryBackend::from_config(Arc::new(backend), &config.retry)),
        );
    }

    // Ensure the default backend exists even when not explicitly configured.
    if router.get(&config.default_backend).is_none() {
        if let Some(base_url) = default_base_url(&config.default_backend) {
            let api_key = config.api_key.clone().unwrap_or_default();
            let backend = OpenAiChatBackend::new(&config.default_backend, base_url, api_key);
            router.register(
                config.default_backend.clone(),
                Arc::new(RetryBackend::from_config(Arc::new(backend), &config.retry)),
            );
        } else {
            warn!(
                backend = %config.default_backend,
                "default backend has no base_url; configure [backends.{}] with one",
                config.default_backend
            );
        }
    }

    router
}

/// Base URLs for well-known OpenAI-compatible providers.
fn default_base_url(backend: &str) -> Option<String> {
    let url = match backend {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        _ => return None,
    };
    Some(url.into())
}
