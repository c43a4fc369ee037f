//! Error types for the Colloquy domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the top-level
//! umbrella with `#[from]` conversions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Colloquy operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Grammar errors ---
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    // --- Dispatch errors ---
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    // --- Engine errors ---
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures surfaced by a chat backend, normalized across vendors.
///
/// `RateLimited` and `ProviderUnavailable` are retryable; everything else
/// surfaces immediately. `ContextTooLarge` is handled by the orchestrator
/// with a single trim-and-retry before it is surfaced.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("context window exceeded: {0}")]
    ContextTooLarge(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether a bounded retry with backoff is worth attempting.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ProviderUnavailable(_)
        )
    }
}

/// Failures raised by the command grammar scanner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed command call: {reason}")]
    MalformedCall { reason: String },
}

/// Failures raised while dispatching a command call.
///
/// Serializable because a failure rides inside the [`CommandResult`] that is
/// fed back to the model as a tool-result turn.
///
/// [`CommandResult`]: crate::command::CommandResult
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("{command} exceeded its {timeout_secs}s timeout")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("{command} declined by confirmation policy")]
    Declined { command: String },

    #[error("{command} failed: {reason}")]
    ExecutorFailure { command: String, reason: String },

    #[error("command cancelled")]
    Cancelled,
}

/// Terminal failures of a whole orchestrated turn.
#[derive(Debug, Clone, Error)]
pub enum OrchestrationError {
    #[error("round limit of {limit} exceeded")]
    RoundLimitExceeded { limit: usize },

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::RateLimited {
            retry_after_secs: 5,
        });
        assert!(err.to_string().contains("5s"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(ProviderError::ProviderUnavailable("503".into()).is_retryable());
        assert!(!ProviderError::AuthFailed("bad key".into()).is_retryable());
        assert!(!ProviderError::ContextTooLarge("9000 > 8192".into()).is_retryable());
        assert!(!ProviderError::Unknown("boom".into()).is_retryable());
    }

    #[test]
    fn command_error_displays_correctly() {
        let err = Error::Command(CommandError::UnknownCommand {
            command: "frobnicate".into(),
        });
        assert!(err.to_string().contains("frobnicate"));
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn command_error_serializes_with_kind_tag() {
        let err = CommandError::Timeout {
            command: "shell".into(),
            timeout_secs: 30,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""kind":"timeout""#));
        assert!(json.contains(r#""command":"shell""#));
    }

    #[test]
    fn orchestration_error_wraps_provider() {
        let err = OrchestrationError::from(ProviderError::ContextTooLarge("too big".into()));
        assert!(err.to_string().contains("too big"));
    }
}
