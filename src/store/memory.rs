//! In-memory [`TaskStore`] used by the test suite and local development.
//! The conditional update runs under the dashmap shard lock, giving the same
//! compare-and-swap semantics as the Postgres `UPDATE ... WHERE status = $n`.

use super::{merge_metadata, StoreError, TaskStore, TransitionUpdate};
use crate::models::GenerationTask;
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, GenerationTask>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &GenerationTask) -> Result<(), StoreError> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<GenerationTask>, StoreError> {
        Ok(self.tasks.get(&task_id).map(|entry| entry.clone()))
    }

    async fn transition(
        &self,
        task_id: Uuid,
        expected: TaskStatus,
        update: TransitionUpdate,
    ) -> Result<bool, StoreError> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(false);
        };

        if entry.status != expected {
            return Ok(false);
        }

        entry.status = update.to;
        entry.result_ref = update.result_ref;
        entry.error_message = update.error_message;
        if let Some(patch) = &update.metadata_patch {
            merge_metadata(&mut entry.metadata, patch);
        }
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn touch(&self, task_id: Uuid) -> Result<bool, StoreError> {
        let Some(mut entry) = self.tasks.get_mut(&task_id) else {
            return Ok(false);
        };

        if entry.status != TaskStatus::Processing {
            return Ok(false);
        }

        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        let mut stale: Vec<GenerationTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.status == TaskStatus::Pending && entry.created_at < cutoff)
            .map(|entry| entry.clone())
            .collect();
        stale.sort_by_key(|task| task.created_at);
        Ok(stale)
    }

    async fn stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        let mut stale: Vec<GenerationTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.status == TaskStatus::Processing && entry.updated_at < cutoff)
            .map(|entry| entry.clone())
            .collect();
        stale.sort_by_key(|task| task.updated_at);
        Ok(stale)
    }

    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<GenerationTask>, StoreError> {
        let mut tasks: Vec<GenerationTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }
}
