use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by the task state machine
#[derive(Debug, Error)]
pub enum StateMachineError {
    /// The event is not legal from the current state. A lost conditional
    /// update is NOT this error; that surfaces as a transition conflict.
    #[error("invalid transition: cannot apply '{event}' from '{from}'")]
    InvalidTransition { from: String, event: String },

    /// The backing store rejected the operation
    #[error("store error during transition: {0}")]
    Store(#[from] StoreError),

    /// Transition applied but the lifecycle event could not be published
    #[error("event publish failed: {0}")]
    Publish(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
