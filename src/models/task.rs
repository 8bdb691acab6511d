//! # Generation Task Model
//!
//! Core model for a client-visible generation task: one request to render a
//! base visual concept plus N independent color-palette variations.
//!
//! ## Database Schema
//!
//! Maps to the `chroma_generation_tasks` table:
//! - `id`: Primary key (UUID)
//! - `owner`: Requesting principal (UUID)
//! - `type`: Task type discriminator (`palette_batch`)
//! - `status`: Lifecycle state (`pending|processing|completed|failed`)
//! - `result_ref`: Primary artifact reference, set only on `completed`
//! - `error_message`: Synthesized failure reason, set only on `failed`
//! - `metadata`: JSONB request parameters, enough to re-derive the work list
//!
//! `updated_at` doubles as the liveness signal: it is touched on every
//! transition and heartbeat-touched while the task is `processing`, which is
//! what lets the sweeper tell "slow but alive" from "dead".

use crate::constants::system::MAX_VARIATIONS_PER_BATCH;
use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Task type discriminator, stored as a string in the `type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Base concept plus a batch of palette variations
    PaletteBatch,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaletteBatch => "palette_batch",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "palette_batch" => Ok(Self::PaletteBatch),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

/// A client-visible generation task tracked through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: Uuid,
    pub owner: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Reference to the primary successful artifact; `Some` iff completed
    pub result_ref: Option<Uuid>,
    /// Synthesized failure reason; `Some` iff failed
    pub error_message: Option<String>,
    /// Opaque request parameters (prompt, palette count, palette names)
    pub metadata: Value,
}

impl GenerationTask {
    /// Build a new pending task owned by `owner`
    pub fn new(owner: Uuid, task_type: TaskType, metadata: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            task_type,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            result_ref: None,
            error_message: None,
            metadata,
        }
    }

    /// Terminal-field consistency: `result_ref` iff completed,
    /// `error_message` iff failed
    pub fn invariants_hold(&self) -> bool {
        let result_ok = self.result_ref.is_some() == (self.status == TaskStatus::Completed);
        let error_ok = self.error_message.is_some() == (self.status == TaskStatus::Failed);
        result_ok && error_ok
    }
}

/// Parsed request parameters for a palette batch, reconstructed from the
/// task's metadata at claim time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Source description of the base concept
    pub prompt: String,
    /// Number of independent palette variations requested
    pub palette_count: usize,
    /// Optional palette descriptions; missing entries get positional names
    #[serde(default)]
    pub palettes: Vec<String>,
}

impl BatchRequest {
    /// Parse a task's metadata bag into a validated request
    pub fn parse(metadata: &Value) -> Result<Self, String> {
        let request: BatchRequest = serde_json::from_value(metadata.clone())
            .map_err(|e| format!("malformed request metadata: {e}"))?;

        if request.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if request.palette_count == 0 {
            return Err("palette_count must be at least 1".to_string());
        }
        if request.palette_count > MAX_VARIATIONS_PER_BATCH {
            return Err(format!(
                "palette_count {} exceeds the per-batch ceiling of {}",
                request.palette_count, MAX_VARIATIONS_PER_BATCH
            ));
        }

        Ok(request)
    }

    /// Description for variation `index`, falling back to a positional name
    pub fn palette_for(&self, index: usize) -> String {
        self.palettes
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("palette {}", index + 1))
    }
}
