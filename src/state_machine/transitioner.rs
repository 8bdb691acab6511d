//! # Task Transitioner
//!
//! The effectful half of the state machine: validates an event against the
//! pure transition table, then applies it to the task store as a conditional
//! update keyed on the expected prior status. Losing that conditional update
//! is a normal outcome (`Conflict`), not an error - it is how redelivered
//! triggers and concurrent sweeps stay safe without a distributed lock.

use super::errors::{StateMachineError, StateMachineResult};
use super::events::{target_for, TaskEvent};
use super::states::TaskStatus;
use crate::events::publisher::EventPublisher;
use crate::store::{TaskStore, TransitionUpdate};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Result of attempting a guarded transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The conditional update won; the task now has the returned status
    Applied(TaskStatus),
    /// Another writer got there first; no side effects were produced
    Conflict,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Applies task lifecycle events through store-level conditional updates
#[derive(Clone)]
pub struct TaskTransitioner {
    store: Arc<dyn TaskStore>,
    publisher: EventPublisher,
}

impl TaskTransitioner {
    pub fn new(store: Arc<dyn TaskStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Attempt to apply `event` to the task, expecting it to currently be in
    /// `current`. Publishes the corresponding lifecycle event only when the
    /// conditional update actually won.
    #[instrument(skip(self, metadata_patch), fields(task_id = %task_id, event = event.event_type()))]
    pub async fn apply(
        &self,
        task_id: Uuid,
        current: TaskStatus,
        event: TaskEvent,
        metadata_patch: Option<Value>,
    ) -> StateMachineResult<TransitionOutcome> {
        let target = target_for(current, &event)?;
        let update = build_update(target, &event, metadata_patch);

        let applied = self.store.transition(task_id, current, update).await?;
        if !applied {
            debug!(
                task_id = %task_id,
                from = %current,
                to = %target,
                "Transition lost the conditional update; treating as already handled"
            );
            return Ok(TransitionOutcome::Conflict);
        }

        let context = transition_context(task_id, current, target, &event);
        self.publisher
            .publish(event.published_as(), context)
            .await
            .map_err(|e| StateMachineError::Publish(e.to_string()))?;

        debug!(task_id = %task_id, from = %current, to = %target, "Transition applied");
        Ok(TransitionOutcome::Applied(target))
    }
}

/// Fold the event into the store update, preserving the terminal-field
/// invariant: `result_ref` only on completed, `error_message` only on failed.
fn build_update(target: TaskStatus, event: &TaskEvent, metadata_patch: Option<Value>) -> TransitionUpdate {
    let (result_ref, error_message) = match event {
        TaskEvent::Complete { result_ref } => (Some(*result_ref), None),
        TaskEvent::Fail { reason } => (None, Some(reason.clone())),
        TaskEvent::Claim => (None, None),
    };

    TransitionUpdate {
        to: target,
        result_ref,
        error_message,
        metadata_patch,
    }
}

fn transition_context(
    task_id: Uuid,
    from: TaskStatus,
    to: TaskStatus,
    event: &TaskEvent,
) -> Value {
    let mut context = json!({
        "task_id": task_id,
        "from": from,
        "to": to,
    });
    match event {
        TaskEvent::Complete { result_ref } => {
            context["result_ref"] = json!(result_ref);
        }
        TaskEvent::Fail { reason } => {
            context["reason"] = json!(reason);
        }
        TaskEvent::Claim => {}
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{GenerationTask, TaskType};
    use crate::store::memory::InMemoryTaskStore;

    fn transitioner_with_store() -> (TaskTransitioner, Arc<InMemoryTaskStore>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let publisher = EventPublisher::default();
        (
            TaskTransitioner::new(store.clone(), publisher),
            store,
        )
    }

    fn sample_task() -> GenerationTask {
        GenerationTask::new(
            Uuid::new_v4(),
            TaskType::PaletteBatch,
            json!({"prompt": "misty harbor at dawn", "palette_count": 3}),
        )
    }

    #[tokio::test]
    async fn test_claim_then_complete() {
        let (transitioner, store) = transitioner_with_store();
        let task = sample_task();
        store.insert(&task).await.unwrap();

        let claimed = transitioner
            .apply(task.id, TaskStatus::Pending, TaskEvent::Claim, None)
            .await
            .unwrap();
        assert_eq!(claimed, TransitionOutcome::Applied(TaskStatus::Processing));

        let artifact = Uuid::new_v4();
        let completed = transitioner
            .apply(
                task.id,
                TaskStatus::Processing,
                TaskEvent::Complete {
                    result_ref: artifact,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(completed, TransitionOutcome::Applied(TaskStatus::Completed));

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result_ref, Some(artifact));
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_second_claim_conflicts() {
        let (transitioner, store) = transitioner_with_store();
        let task = sample_task();
        store.insert(&task).await.unwrap();

        let first = transitioner
            .apply(task.id, TaskStatus::Pending, TaskEvent::Claim, None)
            .await
            .unwrap();
        assert!(first.is_applied());

        let second = transitioner
            .apply(task.id, TaskStatus::Pending, TaskEvent::Claim, None)
            .await
            .unwrap();
        assert_eq!(second, TransitionOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_complete_from_pending_is_rejected() {
        let (transitioner, store) = transitioner_with_store();
        let task = sample_task();
        store.insert(&task).await.unwrap();

        let result = transitioner
            .apply(
                task.id,
                TaskStatus::Pending,
                TaskEvent::Complete {
                    result_ref: Uuid::new_v4(),
                },
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(StateMachineError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_sets_error_message_only() {
        let (transitioner, store) = transitioner_with_store();
        let task = sample_task();
        store.insert(&task).await.unwrap();

        transitioner
            .apply(
                task.id,
                TaskStatus::Pending,
                TaskEvent::fail_with_reason("never claimed"),
                None,
            )
            .await
            .unwrap();

        let stored = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("never claimed"));
        assert!(stored.result_ref.is_none());
    }
}
