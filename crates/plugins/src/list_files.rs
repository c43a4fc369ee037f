//! `list_files` — directory listing scoped to the workspace.

use std::path::PathBuf;

use async_trait::async_trait;
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor};
use colloquy_core::error::CommandError;
use tokio_util::sync::CancellationToken;

use crate::workspace;

pub struct ListFilesExecutor {
    workspace: PathBuf,
}

impl ListFilesExecutor {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ListFilesExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new(
            "list_files",
            "List the entries of a workspace directory. Directories are suffixed with '/'.",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace root. Defaults to the root."
                }
            }
        }))
        .with_timeout_secs(10)
    }

    async fn run(
        &self,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let raw = params["path"].as_str().unwrap_or(".");

        let dir = workspace::resolve(&self.workspace, raw).map_err(|e| {
            CommandError::InvalidArguments {
                command: "list_files".into(),
                reason: e.to_string(),
            }
        })?;

        let mut reader =
            tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| CommandError::ExecutorFailure {
                    command: "list_files".into(),
                    reason: format!("failed to list '{raw}': {e}"),
                })?;

        let mut entries: Vec<(String, bool, u64)> = Vec::new();
        loop {
            let next = tokio::select! {
                entry = reader.next_entry() => {
                    entry.map_err(|e| CommandError::ExecutorFailure {
                        command: "list_files".into(),
                        reason: e.to_string(),
                    })?
                }
                _ = cancel.cancelled() => return Err(CommandError::Cancelled),
            };
            let Some(entry) = next else { break };

            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push((name, is_dir, size));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let text = if entries.is_empty() {
            "(empty)".to_string()
        } else {
            entries
                .iter()
                .map(|(name, is_dir, _)| {
                    if *is_dir {
                        format!("{name}/")
                    } else {
                        name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let data = entries
            .iter()
            .map(|(name, is_dir, size)| {
                serde_json::json!({ "name": name, "dir": is_dir, "size": size })
            })
            .collect::<Vec<_>>();

        Ok(CommandOutput::text(text).with_data(serde_json::Value::Array(data)))
    }
}
