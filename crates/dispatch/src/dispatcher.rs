//! Command dispatch: lookup, confirmation, timeout, cancellation.
//!
//! A dispatch always produces a [`CommandResult`]; failures are encoded in
//! the result rather than raised, because a failed command is an answer the
//! model gets to see and react to. Lifecycle:
//!
//! ```text
//! Pending -> Running -> Succeeded | Failed | TimedOut | Cancelled
//! ```
//!
//! Executors run as spawned tasks under a child cancellation token. On
//! timeout or caller cancellation the token is triggered and the task is
//! left to wind down on its own; whatever it eventually returns is
//! discarded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use colloquy_core::{
    CommandCall, CommandError, CommandResult, ConfirmationPolicy, ReadOnlyPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::ExecutorRegistry;

/// Runs command calls against the executor registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ExecutorRegistry,
    policy: Arc<dyn ConfirmationPolicy>,
}

impl Dispatcher {
    /// Dispatcher with the default confirmation policy: read-only commands
    /// run unprompted, everything else is declined.
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self {
            registry,
            policy: Arc::new(ReadOnlyPolicy),
        }
    }

    /// Swap in a different confirmation policy.
    pub fn with_policy(mut self, policy: Arc<dyn ConfirmationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Run one command call to a terminal state.
    pub async fn dispatch(&self, call: &CommandCall, cancel: &CancellationToken) -> CommandResult {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return CommandResult::failed(call, CommandError::Cancelled, 0);
        }

        let Some(executor) = self.registry.get(&call.name) else {
            warn!(command = %call.name, call_id = %call.id, "unknown command");
            return CommandResult::failed(
                call,
                CommandError::UnknownCommand {
                    command: call.name.clone(),
                },
                elapsed_ms(start),
            );
        };
        let descriptor = executor.descriptor();

        if !self.policy.confirm(&descriptor, &call.params).await {
            info!(command = %call.name, call_id = %call.id, "declined by confirmation policy");
            return CommandResult::failed(
                call,
                CommandError::Declined {
                    command: call.name.clone(),
                },
                elapsed_ms(start),
            );
        }

        debug!(
            command = %call.name,
            call_id = %call.id,
            timeout_secs = descriptor.timeout_secs,
            "running command"
        );

        let child = cancel.child_token();
        let run_token = child.clone();
        let params = call.params.clone();
        let mut task = tokio::spawn(async move { executor.run(params, run_token).await });

        tokio::select! {
            joined = &mut task => {
                let elapsed = elapsed_ms(start);
                match joined {
                    Ok(Ok(output)) => CommandResult::succeeded(call, output, elapsed),
                    Ok(Err(error)) => {
                        warn!(command = %call.name, error = %error, "command failed");
                        CommandResult::failed(call, error, elapsed)
                    }
                    Err(join_error) => {
                        warn!(command = %call.name, error = %join_error, "executor task aborted");
                        CommandResult::failed(
                            call,
                            CommandError::ExecutorFailure {
                                command: call.name.clone(),
                                reason: join_error.to_string(),
                            },
                            elapsed,
                        )
                    }
                }
            }
            () = cancel.cancelled() => {
                child.cancel();
                info!(command = %call.name, call_id = %call.id, "command cancelled");
                CommandResult::failed(call, CommandError::Cancelled, elapsed_ms(start))
            }
            () = tokio::time::sleep(Duration::from_secs(descriptor.timeout_secs)) => {
                child.cancel();
                warn!(
                    command = %call.name,
                    call_id = %call.id,
                    timeout_secs = descriptor.timeout_secs,
                    "command timed out"
                );
                CommandResult::failed(
                    call,
                    CommandError::Timeout {
                        command: call.name.clone(),
                        timeout_secs: descriptor.timeout_secs,
                    },
                    elapsed_ms(start),
                )
            }
        }
    }

    /// Run a batch of calls concurrently. Results come back in the order the
    /// calls were given, regardless of completion order.
    pub async fn dispatch_all(
        &self,
        calls: &[CommandCall],
        cancel: &CancellationToken,
    ) -> Vec<CommandResult> {
        futures::future::join_all(calls.iter().map(|call| self.dispatch(call, cancel))).await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use colloquy_core::{
        AllowAllPolicy, CommandExecutor, CommandOutput, CommandState, ExecutorDescriptor,
        SideEffect, Span,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Echo;

    #[async_trait]
    impl CommandExecutor for Echo {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor::new("echo", "Echoes back the text argument")
        }

        async fn run(
            &self,
            params: serde_json::Value,
            _cancel: CancellationToken,
        ) -> Result<CommandOutput, CommandError> {
            let text = params["text"].as_str().unwrap_or("").to_string();
            Ok(CommandOutput::text(text))
        }
    }

    struct Failing;

    #[async_trait]
    impl CommandExecutor for Failing {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor::new("failing", "Always fails")
        }

        async fn run(
            &self,
            _params: serde_json::Value,
            _cancel: CancellationToken,
        ) -> Result<CommandOutput, CommandError> {
            Err(CommandError::ExecutorFailure {
                command: "failing".into(),
                reason: "broke".into(),
            })
        }
    }

    /// Sleeps far past any test timeout; flags when it sees its token fire.
    struct Hanging {
        saw_cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CommandExecutor for Hanging {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor::new("hang", "Never finishes on its own").with_timeout_secs(1)
        }

        async fn run(
            &self,
            _params: serde_json::Value,
            cancel: CancellationToken,
        ) -> Result<CommandOutput, CommandError> {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(CommandError::Cancelled)
                }
                () = tokio::time::sleep(Duration::from_secs(3600)) => {
                    Ok(CommandOutput::text("woke up"))
                }
            }
        }
    }

    struct Writer;

    #[async_trait]
    impl CommandExecutor for Writer {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor::new("write_file", "Writes a file")
                .with_side_effect(SideEffect::Filesystem)
        }

        async fn run(
            &self,
            _params: serde_json::Value,
            _cancel: CancellationToken,
        ) -> Result<CommandOutput, CommandError> {
            Ok(CommandOutput::text("written"))
        }
    }

    fn call(name: &str, params: serde_json::Value) -> CommandCall {
        CommandCall::new(name, params, Span::new(0, 1))
    }

    fn dispatcher_with(executors: Vec<Arc<dyn CommandExecutor>>) -> Dispatcher {
        let registry = ExecutorRegistry::new();
        for executor in executors {
            registry.register(executor);
        }
        Dispatcher::new(registry)
    }

    #[tokio::test]
    async fn successful_dispatch() {
        let dispatcher = dispatcher_with(vec![Arc::new(Echo)]);
        let c = call("echo", json!({"text": "hello"}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::Succeeded);
        assert_eq!(result.output, "hello");
        assert_eq!(result.call_id, c.id);
    }

    #[tokio::test]
    async fn unknown_command_fails_without_running() {
        let dispatcher = dispatcher_with(vec![Arc::new(Echo)]);
        let c = call("frobnicate", json!({}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::Failed);
        assert!(matches!(
            result.failure,
            Some(CommandError::UnknownCommand { .. })
        ));
    }

    #[tokio::test]
    async fn executor_error_becomes_failed_result() {
        let dispatcher = dispatcher_with(vec![Arc::new(Failing)]);
        let c = call("failing", json!({}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::Failed);
        assert!(result.output.contains("broke"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_produces_timed_out_and_signals_executor() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let dispatcher = dispatcher_with(vec![Arc::new(Hanging {
            saw_cancel: saw_cancel.clone(),
        })]);
        let c = call("hang", json!({}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::TimedOut);
        assert!(matches!(
            result.failure,
            Some(CommandError::Timeout { timeout_secs: 1, .. })
        ));

        // Give the detached task a chance to observe its token.
        tokio::task::yield_now().await;
        assert!(saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let dispatcher = dispatcher_with(vec![Arc::new(Echo)]);
        let token = CancellationToken::new();
        token.cancel();
        let c = call("echo", json!({"text": "never"}));
        let result = dispatcher.dispatch(&c, &token).await;
        assert_eq!(result.state, CommandState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_run() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let dispatcher = dispatcher_with(vec![Arc::new(Hanging {
            saw_cancel: saw_cancel.clone(),
        })]);
        let token = CancellationToken::new();
        let c = call("hang", json!({}));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = dispatcher.dispatch(&c, &token).await;
        assert_eq!(result.state, CommandState::Cancelled);
    }

    #[tokio::test]
    async fn default_policy_declines_side_effects() {
        let dispatcher = dispatcher_with(vec![Arc::new(Writer)]);
        let c = call("write_file", json!({"path": "x", "content": "y"}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::Failed);
        assert!(matches!(result.failure, Some(CommandError::Declined { .. })));
    }

    #[tokio::test]
    async fn allow_all_policy_lets_side_effects_run() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Writer));
        let dispatcher = Dispatcher::new(registry).with_policy(Arc::new(AllowAllPolicy));
        let c = call("write_file", json!({}));
        let result = dispatcher.dispatch(&c, &CancellationToken::new()).await;
        assert_eq!(result.state, CommandState::Succeeded);
        assert_eq!(result.output, "written");
    }

    #[tokio::test]
    async fn batch_results_in_call_order() {
        let dispatcher = dispatcher_with(vec![Arc::new(Echo), Arc::new(Failing)]);
        let calls = vec![
            call("echo", json!({"text": "one"})),
            call("failing", json!({})),
            call("echo", json!({"text": "three"})),
        ];
        let results = dispatcher
            .dispatch_all(&calls, &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].output, "one");
        assert_eq!(results[1].state, CommandState::Failed);
        assert_eq!(results[2].output, "three");
        for (c, r) in calls.iter().zip(results.iter()) {
            assert_eq!(c.id, r.call_id);
        }
    }
}
