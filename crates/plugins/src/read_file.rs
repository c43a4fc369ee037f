//! `read_file` — read a workspace file, with an output cap.

use std::path::PathBuf;

use async_trait::async_trait;
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor};
use colloquy_core::error::CommandError;
use tokio_util::sync::CancellationToken;

use crate::workspace;

/// Output cap. Anything past this is dropped and marked as truncated so a
/// large file cannot flood the conversation window.
pub const MAX_READ_BYTES: usize = 256 * 1024;

pub struct ReadFileExecutor {
    workspace: PathBuf,
}

impl ReadFileExecutor {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ReadFileExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new(
            "read_file",
            "Read the contents of a file in the workspace. Large files are truncated.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to read, relative to the workspace root"
                }
            },
            "required": ["path"]
        }))
        .with_timeout_secs(10)
    }

    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let raw = params["path"]
            .as_str()
            .ok_or_else(|| CommandError::InvalidArguments {
                command: "read_file".into(),
                reason: "missing 'path'".into(),
            })?;

        let path = workspace::resolve(&self.workspace, raw).map_err(|e| {
            CommandError::InvalidArguments {
                command: "read_file".into(),
                reason: e.to_string(),
            }
        })?;

        let mut bytes = tokio::select! {
            read = tokio::fs::read(&path) => {
                read.map_err(|e| CommandError::ExecutorFailure {
                    command: "read_file".into(),
                    reason: format!("failed to read '{raw}': {e}"),
                })?
            }
            _ = cancel.cancelled() => return Err(CommandError::Cancelled),
        };

        let total = bytes.len();
        let truncated = total > MAX_READ_BYTES;
        if truncated {
            bytes.truncate(MAX_READ_BYTES);
        }

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if truncated {
            text.push_str(&format!("\n[truncated: showing {MAX_READ_BYTES} of {total} bytes]"));
        }

        Ok(CommandOutput::text(text).with_data(serde_json::json!({
            "path": raw,
            "bytes": total,
            "truncated": truncated,
        })))
    }
}
