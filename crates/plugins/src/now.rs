//! `now` — current date and time.

use async_trait::async_trait;
use chrono::{Local, SecondsFormat, Utc};
use colloquy_core::command::{CommandExecutor, CommandOutput, ExecutorDescriptor};
use colloquy_core::error::CommandError;
use tokio_util::sync::CancellationToken;

pub struct NowExecutor;

#[async_trait]
impl CommandExecutor for NowExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor::new("now", "Current date and time, local and UTC.")
            .with_timeout_secs(5)
    }

    async fn run(
        &self,
        _params: serde_json::Value,
        _cancel: CancellationToken,
    ) -> Result<CommandOutput, CommandError> {
        let utc = Utc::now();
        let local = Local::now();

        let text = format!(
            "{} ({})",
            local.to_rfc3339_opts(SecondsFormat::Secs, false),
            local.format("%A")
        );

        Ok(CommandOutput::text(text).with_data(serde_json::json!({
            "local": local.to_rfc3339_opts(SecondsFormat::Secs, false),
            "utc": utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            "unix": utc.timestamp(),
        })))
    }
}
