//! `write_file` — create or overwrite a workspace file.

use std::path::PathBuf;

use async_trait::async_trait;
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor, SideEffect};
use colloquy_core::error::CommandError;
use tokio_util::sync::CancellationToken;

use crate::workspace;

pub struct WriteFileExecutor {
    workspace: PathBuf,
}

impl WriteFileExecutor {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for WriteFileExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new(
            "write_file",
            "Write content to a workspace file. Creates the file if missing, overwrites otherwise.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to write, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"]
        }))
        .with_timeout_secs(10)
        .with_side_effect(SideEffect::Filesystem)
    }

    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let raw = params["path"]
            .as_str()
            .ok_or_else(|| CommandError::InvalidArguments {
                command: "write_file".into(),
                reason: "missing 'path'".into(),
            })?;

        let content = params["content"]
            .as_str()
            .ok_or_else(|| CommandError::InvalidArguments {
                command: "write_file".into(),
                reason: "missing 'content'".into(),
            })?;

        let path = workspace::resolve(&self.workspace, raw).map_err(|e| {
            CommandError::InvalidArguments {
                command: "write_file".into(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Err(CommandError::ExecutorFailure {
                command: "write_file".into(),
                reason: format!("failed to create parent directory: {e}"),
            });
        }

        tokio::select! {
            written = tokio::fs::write(&path, content) => {
                written.map_err(|e| CommandError::ExecutorFailure {
                    command: "write_file".into(),
                    reason: format!("failed to write '{raw}': {e}"),
                })?;
            }
            _ = cancel.cancelled() => return Err(CommandError::Cancelled),
        }

        Ok(
            CommandOutput::text(format!("wrote {} bytes to {raw}", content.len())).with_data(
                serde_json::json!({ "path": raw, "bytes": content.len() }),
            ),
        )
    }
}
