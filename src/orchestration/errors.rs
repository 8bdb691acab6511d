use crate::state_machine::StateMachineError;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Faults that prevent the orchestration entry point from reaching its
/// finalization step. A task left in `processing` by one of these is
/// reconciled by the sweeper, not retried in-process.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("task {task_id} does not exist")]
    TaskNotFound { task_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
