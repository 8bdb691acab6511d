use super::errors::StateMachineError;
use super::states::TaskStatus;
use crate::constants::events as event_names;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events that can trigger task state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Claim the task for processing (the idempotency boundary)
    Claim,
    /// Mark the task completed with a reference to the primary artifact
    Complete { result_ref: Uuid },
    /// Mark the task failed with a synthesized reason
    Fail { reason: String },
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
        }
    }

    /// Published event name for the transition this event produces
    pub fn published_as(&self) -> &'static str {
        match self {
            Self::Claim => event_names::TASK_CLAIMED,
            Self::Complete { .. } => event_names::TASK_COMPLETED,
            Self::Fail { .. } => event_names::TASK_FAILED,
        }
    }

    /// Extract the failure reason if this is a failure event
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Fail { reason } => Some(reason),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Fail { .. })
    }

    /// Create a failure event with the given reason
    pub fn fail_with_reason(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }
}

/// Determine the target state for an event applied to the given state.
///
/// This is the whole transition table. `Fail` is accepted from both
/// non-terminal states because the sweeper reaps unclaimed `pending` tasks
/// as well as stalled `processing` ones. Terminal states accept nothing.
pub fn target_for(current: TaskStatus, event: &TaskEvent) -> Result<TaskStatus, StateMachineError> {
    match (current, event) {
        (TaskStatus::Pending, TaskEvent::Claim) => Ok(TaskStatus::Processing),
        (TaskStatus::Processing, TaskEvent::Complete { .. }) => Ok(TaskStatus::Completed),
        (TaskStatus::Pending, TaskEvent::Fail { .. })
        | (TaskStatus::Processing, TaskEvent::Fail { .. }) => Ok(TaskStatus::Failed),
        (from, event) => Err(StateMachineError::InvalidTransition {
            from: from.to_string(),
            event: event.event_type().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn complete() -> TaskEvent {
        TaskEvent::Complete {
            result_ref: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            target_for(TaskStatus::Pending, &TaskEvent::Claim).unwrap(),
            TaskStatus::Processing
        );
        assert_eq!(
            target_for(TaskStatus::Processing, &complete()).unwrap(),
            TaskStatus::Completed
        );
        assert_eq!(
            target_for(TaskStatus::Processing, &TaskEvent::fail_with_reason("x")).unwrap(),
            TaskStatus::Failed
        );
        assert_eq!(
            target_for(TaskStatus::Pending, &TaskEvent::fail_with_reason("never claimed"))
                .unwrap(),
            TaskStatus::Failed
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot complete without claiming first
        assert!(target_for(TaskStatus::Pending, &complete()).is_err());
        // Cannot re-claim a claimed task
        assert!(target_for(TaskStatus::Processing, &TaskEvent::Claim).is_err());
    }

    fn arb_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Processing),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
        ]
    }

    fn arb_event() -> impl Strategy<Value = TaskEvent> {
        prop_oneof![
            Just(TaskEvent::Claim),
            Just(TaskEvent::Complete {
                result_ref: Uuid::nil()
            }),
            ".{0,32}".prop_map(TaskEvent::fail_with_reason),
        ]
    }

    proptest! {
        /// Terminal states admit no event at all
        #[test]
        fn prop_terminal_states_are_immutable(event in arb_event()) {
            prop_assert!(target_for(TaskStatus::Completed, &event).is_err());
            prop_assert!(target_for(TaskStatus::Failed, &event).is_err());
        }

        /// Claim succeeds from pending and only from pending
        #[test]
        fn prop_claim_only_from_pending(status in arb_status()) {
            let result = target_for(status, &TaskEvent::Claim);
            if status == TaskStatus::Pending {
                prop_assert_eq!(result.unwrap(), TaskStatus::Processing);
            } else {
                prop_assert!(result.is_err());
            }
        }

        /// Every applied transition moves forward: the target is never the source
        #[test]
        fn prop_transitions_make_progress(status in arb_status(), event in arb_event()) {
            if let Ok(target) = target_for(status, &event) {
                prop_assert_ne!(target, status);
            }
        }
    }
}
