//! `shell` — run an allowlisted shell command.

use std::process::Stdio;

use async_trait::async_trait;
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor, SideEffect};
use colloquy_core::error::CommandError;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Combined stdout/stderr cap fed back to the model.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

pub struct ShellExecutor {
    /// If non-empty, only commands whose base name appears here may run.
    allowed_commands: Vec<String>,
}

impl ShellExecutor {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    fn is_allowed(&self, command_line: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        let base = command_line.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base)
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new(
            "shell",
            "Run a shell command and return its stdout and stderr.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command line to run"
                }
            },
            "required": ["command"]
        }))
        .with_timeout_secs(60)
        .with_side_effect(SideEffect::CodeExecution)
    }

    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let command_line =
            params["command"]
                .as_str()
                .ok_or_else(|| CommandError::InvalidArguments {
                    command: "shell".into(),
                    reason: "missing 'command'".into(),
                })?;

        if !self.is_allowed(command_line) {
            let base = command_line.split_whitespace().next().unwrap_or("");
            return Err(CommandError::InvalidArguments {
                command: "shell".into(),
                reason: format!("'{base}' is not in the allowed command list"),
            });
        }

        debug!(command = %command_line, "running shell command");

        let mut builder = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command_line]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_line]);
            c
        };

        let child = builder
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::ExecutorFailure {
                command: "shell".into(),
                reason: format!("failed to spawn: {e}"),
            })?;

        // Dropping the wait future on cancellation kills the child.
        let output = tokio::select! {
            waited = child.wait_with_output() => {
                waited.map_err(|e| CommandError::ExecutorFailure {
                    command: "shell".into(),
                    reason: e.to_string(),
                })?
            }
            _ = cancel.cancelled() => return Err(CommandError::Cancelled),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(
                CommandOutput::text(clip(text.trim().to_string(), MAX_OUTPUT_BYTES))
                    .with_data(serde_json::json!({ "exit_code": 0 })),
            )
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command_line, exit_code = code, "shell command failed");
            let combined = format!("{stdout}\n{stderr}");
            Err(CommandError::ExecutorFailure {
                command: "shell".into(),
                reason: format!(
                    "exit code {code}\n{}",
                    clip(combined.trim().to_string(), MAX_OUTPUT_BYTES)
                ),
            })
        }
    }
}

fn clip(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str("\n[output truncated]");
    text
}
