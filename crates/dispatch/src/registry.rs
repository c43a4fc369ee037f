//! Executor registry with snapshot semantics.
//!
//! The map of registered executors is immutable once published. Readers take
//! an [`Arc`] snapshot and keep working against it even while a registration
//! is in flight; writers build a new map and swap the pointer. A dispatch
//! that started against one snapshot is never affected by a later swap.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use colloquy_core::{CommandExecutor, ExecutorDescriptor};
use tracing::{debug, warn};

type ExecutorMap = HashMap<String, Arc<dyn CommandExecutor>>;

/// Shared registry of command executors.
///
/// Cloning is cheap and every clone sees the same underlying registry.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    inner: Arc<RwLock<Arc<ExecutorMap>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an executor under its descriptor name. Re-registering a name
    /// replaces the previous executor; in-flight dispatches keep the
    /// snapshot they started with.
    pub fn register(&self, executor: Arc<dyn CommandExecutor>) {
        let descriptor = executor.descriptor();
        let name = descriptor.name.clone();
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: ExecutorMap = slot.as_ref().clone();
        if next.insert(name.clone(), executor).is_some() {
            warn!(command = %name, "replacing previously registered executor");
        } else {
            debug!(command = %name, "registered executor");
        }
        *slot = Arc::new(next);
    }

    /// Remove an executor. Returns whether the name was registered.
    pub fn deregister(&self, name: &str) -> bool {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !slot.contains_key(name) {
            return false;
        }
        let mut next: ExecutorMap = slot.as_ref().clone();
        next.remove(name);
        *slot = Arc::new(next);
        debug!(command = %name, "deregistered executor");
        true
    }

    /// Current published map. The snapshot stays valid regardless of later
    /// registrations.
    pub fn snapshot(&self) -> Arc<ExecutorMap> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandExecutor>> {
        self.snapshot().get(name).cloned()
    }

    /// Descriptors of every registered executor, sorted by name so prompt
    /// catalogs come out in a stable order.
    pub fn descriptors(&self) -> Vec<ExecutorDescriptor> {
        let snapshot = self.snapshot();
        let mut all: Vec<ExecutorDescriptor> =
            snapshot.values().map(|e| e.descriptor()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors().into_iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use colloquy_core::{CommandError, CommandOutput};
    use tokio_util::sync::CancellationToken;

    struct Fixed {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl CommandExecutor for Fixed {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor::new(self.name, "fixed reply")
        }

        async fn run(
            &self,
            _params: serde_json::Value,
            _cancel: CancellationToken,
        ) -> Result<CommandOutput, CommandError> {
            Ok(CommandOutput::text(self.reply))
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Fixed { name: "now", reply: "noon" }));
        assert!(registry.get("now").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn re_registering_replaces() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Fixed { name: "now", reply: "first" }));
        registry.register(Arc::new(Fixed { name: "now", reply: "second" }));
        assert_eq!(registry.len(), 1);

        let executor = registry.get("now").unwrap();
        let out = executor
            .run(serde_json::json!({}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.text, "second");
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Fixed { name: "a", reply: "a" }));

        let before = registry.snapshot();
        registry.register(Arc::new(Fixed { name: "b", reply: "b" }));

        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn descriptors_sorted_by_name() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Fixed { name: "zeta", reply: "" }));
        registry.register(Arc::new(Fixed { name: "alpha", reply: "" }));
        registry.register(Arc::new(Fixed { name: "mid", reply: "" }));

        let names = registry.names();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn deregister_removes() {
        let registry = ExecutorRegistry::new();
        registry.register(Arc::new(Fixed { name: "gone", reply: "" }));
        assert!(registry.deregister("gone"));
        assert!(!registry.deregister("gone"));
        assert!(registry.is_empty());
    }
}
