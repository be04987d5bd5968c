use std::collections::HashMap;

use tokio::task::{AbortHandle, Id};

/// A live subscription operation, backed by its producer task.
#[derive(Debug)]
pub struct OperationHandle {
    operation_id: String,
    task: AbortHandle,
}

impl OperationHandle {
    pub fn new(operation_id: impl Into<String>, task: AbortHandle) -> Self {
        Self {
            operation_id: operation_id.into(),
            task,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn task_id(&self) -> Id {
        self.task.id()
    }

    /// Stops the producer at its next suspension point. Calling it again,
    /// or after the producer finished, does nothing.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_complete(&self) -> bool {
        self.task.is_finished()
    }
}

/// Live operations of one connection, keyed by operation id.
///
/// Owned by the connection's engine task and never shared.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationHandle>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` under its id, returning the handle it replaced.
    pub fn register(&mut self, handle: OperationHandle) -> Option<OperationHandle> {
        self.operations
            .insert(handle.operation_id.clone(), handle)
    }

    pub fn lookup(&self, id: &str) -> Option<&OperationHandle> {
        self.operations.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<OperationHandle> {
        self.operations.remove(id)
    }

    /// Removes the handle for `id` only if it belongs to producer task
    /// `task_id`. A result from an older producer whose id was since reused
    /// leaves the newer handle in place.
    pub fn remove_finished(&mut self, id: &str, task_id: Id) -> Option<OperationHandle> {
        match self.operations.get(id) {
            Some(handle) if handle.task_id() == task_id => self.operations.remove(id),
            _ => None,
        }
    }

    /// The operation id whose producer is task `task_id`.
    pub fn find_task(&self, task_id: Id) -> Option<&str> {
        self.operations
            .values()
            .find(|handle| handle.task_id() == task_id)
            .map(OperationHandle::operation_id)
    }

    /// Cancels and forgets every live operation.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.operations.len();
        for (_, handle) in self.operations.drain() {
            handle.cancel();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use tokio::task::JoinSet;

    fn pending_handle(tasks: &mut JoinSet<()>, id: &str) -> OperationHandle {
        OperationHandle::new(id, tasks.spawn(pending::<()>()))
    }

    #[tokio::test]
    async fn test_register_lookup_remove() {
        let mut tasks = JoinSet::new();
        let mut registry = OperationRegistry::new();
        assert!(registry.register(pending_handle(&mut tasks, "1")).is_none());

        assert!(registry.contains("1"));
        assert_eq!(registry.lookup("1").unwrap().operation_id(), "1");
        assert!(registry.lookup("2").is_none());

        let handle = registry.remove("1").unwrap();
        handle.cancel();
        assert!(registry.is_empty());
        assert!(registry.remove("1").is_none());
    }

    #[tokio::test]
    async fn test_remove_finished_ignores_stale_task() {
        let mut tasks = JoinSet::new();
        let mut registry = OperationRegistry::new();

        let old = pending_handle(&mut tasks, "1");
        let old_task = old.task_id();
        old.cancel();
        registry.register(pending_handle(&mut tasks, "1"));

        assert!(registry.remove_finished("1", old_task).is_none());
        assert!(registry.contains("1"));

        let current = registry.lookup("1").unwrap().task_id();
        assert_eq!(registry.find_task(current), Some("1"));
        assert!(registry.remove_finished("1", current).is_some());
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_producers() {
        let mut tasks = JoinSet::new();
        let mut registry = OperationRegistry::new();
        registry.register(pending_handle(&mut tasks, "a"));
        registry.register(pending_handle(&mut tasks, "b"));

        assert_eq!(registry.cancel_all(), 2);
        assert_eq!(registry.len(), 0);

        while let Some(joined) = tasks.join_next().await {
            assert!(joined.unwrap_err().is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut tasks = JoinSet::new();
        let handle = pending_handle(&mut tasks, "1");
        handle.cancel();
        handle.cancel();
        assert!(tasks.join_next().await.unwrap().unwrap_err().is_cancelled());
        assert!(handle.is_complete());
    }
}
