use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChromaError {
    DatabaseError(String),
    StateTransitionError(String),
    OrchestrationError(String),
    EventError(String),
    ConfigurationError(String),
}

impl fmt::Display for ChromaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            ChromaError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            ChromaError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            ChromaError::EventError(msg) => write!(f, "Event error: {msg}"),
            ChromaError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ChromaError {}

impl From<crate::store::StoreError> for ChromaError {
    fn from(err: crate::store::StoreError) -> Self {
        ChromaError::DatabaseError(err.to_string())
    }
}

impl From<crate::state_machine::StateMachineError> for ChromaError {
    fn from(err: crate::state_machine::StateMachineError) -> Self {
        ChromaError::StateTransitionError(err.to_string())
    }
}

impl From<crate::orchestration::OrchestrationError> for ChromaError {
    fn from(err: crate::orchestration::OrchestrationError) -> Self {
        ChromaError::OrchestrationError(err.to_string())
    }
}

impl From<crate::events::PublishError> for ChromaError {
    fn from(err: crate::events::PublishError) -> Self {
        ChromaError::EventError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChromaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_errors_fold_into_crate_error() {
        let store_err = crate::store::StoreError::database("transition", "connection reset");
        let err: ChromaError = store_err.into();
        assert!(matches!(err, ChromaError::DatabaseError(_)));
        assert!(err.to_string().contains("connection reset"));

        let sm_err = crate::state_machine::StateMachineError::InvalidTransition {
            from: "completed".to_string(),
            event: "claim".to_string(),
        };
        let err: ChromaError = sm_err.into();
        assert!(matches!(err, ChromaError::StateTransitionError(_)));
    }
}
