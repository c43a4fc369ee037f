//! Confirmation policy — the gate in front of side-effectful commands.

use async_trait::async_trait;

use crate::command::{ExecutorDescriptor, SideEffect};

/// Asked before any non-read-only command runs. A decline turns the call
/// into a `Declined` failure result; it never aborts the turn.
#[async_trait]
pub trait ConfirmationPolicy: Send + Sync {
    async fn confirm(&self, descriptor: &ExecutorDescriptor, params: &serde_json::Value) -> bool;
}

/// The safe default: read-only commands run, everything else is declined.
pub struct ReadOnlyPolicy;

#[async_trait]
impl ConfirmationPolicy for ReadOnlyPolicy {
    async fn confirm(&self, descriptor: &ExecutorDescriptor, _params: &serde_json::Value) -> bool {
        descriptor.side_effect == SideEffect::ReadOnly
    }
}

/// Approves everything. For trusted sessions and tests.
pub struct AllowAllPolicy;

#[async_trait]
impl ConfirmationPolicy for AllowAllPolicy {
    async fn confirm(
        &self,
        _descriptor: &ExecutorDescriptor,
        _params: &serde_json::Value,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_only_policy_gates_by_side_effect() {
        let policy = ReadOnlyPolicy;
        let read = ExecutorDescriptor::new("now", "clock");
        let write = ExecutorDescriptor::new("write_file", "writes")
            .with_side_effect(SideEffect::Filesystem);

        assert!(policy.confirm(&read, &serde_json::json!({})).await);
        assert!(!policy.confirm(&write, &serde_json::json!({})).await);
    }

    #[tokio::test]
    async fn allow_all_policy_approves_code_execution() {
        let policy = AllowAllPolicy;
        let shell =
            ExecutorDescriptor::new("shell", "runs").with_side_effect(SideEffect::CodeExecution);
        assert!(policy.confirm(&shell, &serde_json::json!({})).await);
    }
}
