//! # Postgres Task Store
//!
//! Production [`TaskStore`] backed by sqlx. Conditional transitions are a
//! single `UPDATE ... WHERE id = $n AND status = $m`; `rows_affected` is the
//! compare-and-swap verdict, so no transaction or advisory lock is needed.

use super::{StoreError, TaskStore, TransitionUpdate};
use crate::models::GenerationTask;
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, owner, type AS task_type, status, created_at, updated_at, \
                              result_ref, error_message, metadata";

/// Task store over a Postgres connection pool
#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Internal struct for SQL query results
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    owner: Uuid,
    task_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    result_ref: Option<Uuid>,
    error_message: Option<String>,
    metadata: serde_json::Value,
}

impl TaskRow {
    fn into_task(self) -> Result<GenerationTask, StoreError> {
        let task_type = self.task_type.parse().map_err(|message| StoreError::Corrupt {
            task_id: self.id,
            message,
        })?;
        let status = self.status.parse().map_err(|message| StoreError::Corrupt {
            task_id: self.id,
            message,
        })?;

        Ok(GenerationTask {
            id: self.id,
            owner: self.owner,
            task_type,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            result_ref: self.result_ref,
            error_message: self.error_message,
            metadata: self.metadata,
        })
    }
}

fn collect_rows(rows: Vec<TaskRow>) -> Result<Vec<GenerationTask>, StoreError> {
    rows.into_iter().map(TaskRow::into_task).collect()
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: &GenerationTask) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chroma_generation_tasks
                (id, owner, type, status, created_at, updated_at, result_ref, error_message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id)
        .bind(task.owner)
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.result_ref)
        .bind(task.error_message.as_deref())
        .bind(&task.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(task_id = %task.id, "Failed to insert task: {}", e);
            StoreError::database("insert", e)
        })?;

        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<GenerationTask>, StoreError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM chroma_generation_tasks WHERE id = $1");

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(task_id = %task_id, "Failed to fetch task: {}", e);
                StoreError::database("get", e)
            })?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn transition(
        &self,
        task_id: Uuid,
        expected: TaskStatus,
        update: TransitionUpdate,
    ) -> Result<bool, StoreError> {
        // `metadata || patch` is the same shallow merge the in-memory store
        // performs; a NULL patch leaves metadata untouched
        let result = sqlx::query(
            r#"
            UPDATE chroma_generation_tasks
            SET status = $1,
                result_ref = $2,
                error_message = $3,
                metadata = CASE WHEN $4::jsonb IS NULL THEN metadata ELSE metadata || $4::jsonb END,
                updated_at = NOW()
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(update.to.as_str())
        .bind(update.result_ref)
        .bind(update.error_message.as_deref())
        .bind(update.metadata_patch.as_ref())
        .bind(task_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(task_id = %task_id, "Failed to apply conditional transition: {}", e);
            StoreError::database("transition", e)
        })?;

        let applied = result.rows_affected() == 1;
        debug!(
            task_id = %task_id,
            expected = %expected,
            to = %update.to,
            applied = applied,
            "Conditional transition"
        );
        Ok(applied)
    }

    async fn touch(&self, task_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE chroma_generation_tasks SET updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(task_id)
        .bind(TaskStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(task_id = %task_id, "Failed to heartbeat task: {}", e);
            StoreError::database("touch", e)
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chroma_generation_tasks \
             WHERE status = $1 AND created_at < $2 ORDER BY created_at"
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Pending.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query stale pending tasks: {}", e);
                StoreError::database("stale_pending", e)
            })?;

        collect_rows(rows)
    }

    async fn stale_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<GenerationTask>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chroma_generation_tasks \
             WHERE status = $1 AND updated_at < $2 ORDER BY updated_at"
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(TaskStatus::Processing.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to query stale processing tasks: {}", e);
                StoreError::database("stale_processing", e)
            })?;

        collect_rows(rows)
    }

    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<GenerationTask>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM chroma_generation_tasks \
             WHERE owner = $1 ORDER BY created_at DESC"
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(owner = %owner, "Failed to list tasks for owner: {}", e);
                StoreError::database("list_for_owner", e)
            })?;

        collect_rows(rows)
    }
}
