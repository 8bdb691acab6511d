//! # Task Store
//!
//! Durable record of generation tasks, keyed by task id. The store exposes
//! one concurrency primitive and only one: a conditional update that applies
//! a transition iff the row still carries the expected status. Every writer
//! (orchestrator and sweeper alike) goes through it, which is what makes a
//! lost race harmless instead of a lost update.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::models::GenerationTask;
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryTaskStore;
#[cfg(feature = "postgres")]
pub use postgres::PgTaskStore;

/// Errors surfaced by task store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("corrupt task row {task_id}: {message}")]
    Corrupt { task_id: Uuid, message: String },
}

impl StoreError {
    pub fn database(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// The write half of a conditional transition: target status plus the
/// terminal fields that travel with it. `metadata_patch`, when present, is
/// shallow-merged into the existing metadata object.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub to: TaskStatus,
    pub result_ref: Option<Uuid>,
    pub error_message: Option<String>,
    pub metadata_patch: Option<Value>,
}

/// Row store with conditional-update semantics for generation tasks
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a freshly created task
    async fn insert(&self, task: &GenerationTask) -> Result<(), StoreError>;

    /// Fetch a task by id
    async fn get(&self, task_id: Uuid) -> Result<Option<GenerationTask>, StoreError>;

    /// Apply `update` iff the stored status still equals `expected`.
    /// Returns whether the conditional update won. Always touches
    /// `updated_at` when it applies.
    async fn transition(
        &self,
        task_id: Uuid,
        expected: TaskStatus,
        update: TransitionUpdate,
    ) -> Result<bool, StoreError>;

    /// Heartbeat: bump `updated_at` iff the task is still processing.
    /// Returns whether a row was touched.
    async fn touch(&self, task_id: Uuid) -> Result<bool, StoreError>;

    /// Pending tasks created before `cutoff` (sweeper query)
    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError>;

    /// Processing tasks whose liveness signal predates `cutoff` (sweeper query)
    async fn stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError>;

    /// Read-only projection for the polling surface
    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<GenerationTask>, StoreError>;
}

/// Shallow-merge `patch` into `metadata`, mirroring Postgres `||` on jsonb:
/// object keys are inserted/overwritten, anything else replaces wholesale.
pub(crate) fn merge_metadata(metadata: &mut Value, patch: &Value) {
    match (metadata.as_object_mut(), patch.as_object()) {
        (Some(base), Some(extra)) => {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        _ => *metadata = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_metadata_inserts_and_overwrites() {
        let mut metadata = json!({"prompt": "x", "palette_count": 5});
        merge_metadata(&mut metadata, &json!({"failed_variations": 2, "palette_count": 4}));
        assert_eq!(
            metadata,
            json!({"prompt": "x", "palette_count": 4, "failed_variations": 2})
        );
    }

    #[test]
    fn test_merge_metadata_non_object_replaces() {
        let mut metadata = json!("opaque");
        merge_metadata(&mut metadata, &json!({"a": 1}));
        assert_eq!(metadata, json!({"a": 1}));
    }
}
