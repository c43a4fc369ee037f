//! Command types and the executor trait.
//!
//! Commands are how the model acts on the world: list files, fetch a URL,
//! run a shell command. The model embeds command calls in its output, the
//! grammar scanner extracts them, and the dispatcher runs them against
//! registered executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::CommandError;

/// Byte range in the raw assistant output a command call was extracted
/// from, so the call text can be sliced out before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether two spans share any character position.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A command invocation extracted from assistant output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCall {
    /// Unique call ID (correlates results back to this call)
    pub id: String,

    /// Name of the command to execute
    pub name: String,

    /// Named arguments as a JSON object
    #[serde(default)]
    pub params: serde_json::Value,

    /// Where in the assistant output this call appeared
    pub span: Span,
}

impl CommandCall {
    pub fn new(name: impl Into<String>, params: serde_json::Value, span: Span) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            params,
            span,
        }
    }
}

/// Lifecycle of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl CommandState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// What an executor hands back on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Human/model-readable output text
    pub text: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Terminal outcome of a command call. Always fed back to the model as a
/// tool-result turn — a failed command is an answer, not an engine fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// The call this result is for
    pub call_id: String,

    /// Name of the command that ran
    pub command: String,

    /// Terminal state
    pub state: CommandState,

    /// Output text on success; failure description otherwise
    pub output: String,

    /// Optional structured payload (success only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Failure detail when the command did not succeed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CommandError>,

    /// Wall-clock execution time
    pub duration_ms: u64,
}

impl CommandResult {
    /// Build a success result for a call.
    pub fn succeeded(call: &CommandCall, output: CommandOutput, duration_ms: u64) -> Self {
        Self {
            call_id: call.id.clone(),
            command: call.name.clone(),
            state: CommandState::Succeeded,
            output: output.text,
            data: output.data,
            failure: None,
            duration_ms,
        }
    }

    /// Build a failure result for a call. The terminal state is derived
    /// from the error kind.
    pub fn failed(call: &CommandCall, error: CommandError, duration_ms: u64) -> Self {
        let state = match &error {
            CommandError::Timeout { .. } => CommandState::TimedOut,
            CommandError::Cancelled => CommandState::Cancelled,
            _ => CommandState::Failed,
        };
        Self {
            call_id: call.id.clone(),
            command: call.name.clone(),
            state,
            output: error.to_string(),
            data: None,
            failure: Some(error),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == CommandState::Succeeded
    }

    /// Render this result as the body of a tool-result turn.
    pub fn render(&self) -> String {
        let body = serde_json::json!({
            "cmd": self.command,
            "state": self.state,
            "output": self.output,
            "data": self.data,
        });
        body.to_string()
    }
}

/// How a command touches the world, used by confirmation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Observes only; always safe
    ReadOnly,
    /// Creates or modifies files
    Filesystem,
    /// Talks to the network
    Network,
    /// Runs arbitrary code
    CodeExecution,
}

/// Everything the registry knows about an executor: what it is called, what
/// arguments it takes, how long it may run, and how it touches the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    /// The unique command name (e.g., "list_files")
    pub name: String,

    /// Description shown to the model in the command catalog
    pub description: String,

    /// JSON Schema describing the command's parameters
    pub params_schema: serde_json::Value,

    /// Per-call execution deadline
    pub timeout_secs: u64,

    /// Side-effect class for confirmation gating
    pub side_effect: SideEffect,
}

impl ExecutorDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params_schema: serde_json::json!({ "type": "object", "properties": {} }),
            timeout_secs: 30,
            side_effect: SideEffect::ReadOnly,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.params_schema = schema;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_side_effect(mut self, side_effect: SideEffect) -> Self {
        self.side_effect = side_effect;
        self
    }
}

/// The core executor trait.
///
/// Each bundled command (list_files, read_file, http_get, shell, ...)
/// implements this trait. Executors are registered in the plugin registry
/// and invoked by the dispatcher under the descriptor's timeout.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// This executor's registered capability.
    fn descriptor(&self) -> ExecutorDescriptor;

    /// Execute with the given arguments. Implementations should poll
    /// `cancel` at their own suspension points; the dispatcher triggers it
    /// on timeout or user cancellation.
    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> std::result::Result<CommandOutput, CommandError>;
}
