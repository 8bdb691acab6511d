//! Shared types for the fan-out pipeline: work specifications, per-unit
//! outcomes, and the aggregate result of one orchestration pass.

use crate::constants::system::MAX_ERROR_SUMMARY_CHARS;
use crate::models::{BatchRequest, GenerationTask};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// One independently-processable unit of work: apply one palette to the
/// task's base concept. Derived from task metadata at claim time and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSpec {
    /// Position within the batch; also the tie-breaker for the primary artifact
    pub spec_id: usize,
    pub task_id: Uuid,
    pub prompt: String,
    /// Palette description handed to the renderer
    pub palette: String,
}

/// Classified reason a work unit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The unit overran its time budget
    Timeout,
    /// The generation service errored
    UpstreamError,
    /// Artifact persistence errored
    StorageError,
    /// Panic or other fault the executor could not classify
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::UpstreamError => "upstream_error",
            Self::StorageError => "storage_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit's failure, isolated from its siblings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl UnitFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal result of one work unit run
#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub spec_id: usize,
    pub result: Result<Uuid, UnitFailure>,
    /// Time spent executing, excluding the wait for a limiter slot
    pub duration: Duration,
}

impl WorkOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn artifact_id(&self) -> Option<Uuid> {
        self.result.as_ref().ok().copied()
    }
}

/// What one call to the orchestration entry point did
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationOutcome {
    /// Task finalized as completed; `failed` units were recorded, not fatal
    Completed {
        result_ref: Uuid,
        succeeded: usize,
        failed: usize,
    },
    /// Zero units succeeded; task finalized as failed
    Failed { failed: usize },
    /// The claim was lost: another invocation or the sweeper owns the task
    ClaimConflict,
    /// Work ran but the finalizing update lost to a concurrent sweep
    FinalizeConflict { succeeded: usize, failed: usize },
}

/// Derive the batch's work list from task metadata. Deterministic: the same
/// metadata always yields the same specs, so a re-claimed task re-derives
/// identical work.
pub fn derive_work_specs(task: &GenerationTask) -> Result<Vec<WorkSpec>, String> {
    let request = BatchRequest::parse(&task.metadata)?;

    Ok((0..request.palette_count)
        .map(|index| WorkSpec {
            spec_id: index,
            task_id: task.id,
            prompt: request.prompt.clone(),
            palette: request.palette_for(index),
        })
        .collect())
}

/// Synthesize the human-readable `error_message` for a zero-success batch,
/// enumerating per-unit reasons, bounded so the task row stays small.
pub fn synthesize_error_summary(outcomes: &[WorkOutcome]) -> String {
    let failures: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|failure| format!("unit {}: {}: {}", outcome.spec_id, failure.kind, failure.message))
        })
        .collect();

    let mut summary = format!(
        "all {} variations failed: {}",
        failures.len(),
        failures.join("; ")
    );
    if summary.len() > MAX_ERROR_SUMMARY_CHARS {
        summary.truncate(MAX_ERROR_SUMMARY_CHARS);
        summary.push_str("...");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskType;
    use serde_json::json;

    fn task_with_metadata(metadata: serde_json::Value) -> GenerationTask {
        GenerationTask::new(Uuid::new_v4(), TaskType::PaletteBatch, metadata)
    }

    fn failed_outcome(spec_id: usize, kind: FailureKind, message: &str) -> WorkOutcome {
        WorkOutcome {
            spec_id,
            result: Err(UnitFailure::new(kind, message)),
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_derive_specs_is_deterministic() {
        let task = task_with_metadata(json!({
            "prompt": "lighthouse in a storm",
            "palette_count": 3,
            "palettes": ["ember", "glacier"]
        }));

        let first = derive_work_specs(&task).unwrap();
        let second = derive_work_specs(&task).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].palette, "ember");
        assert_eq!(first[2].palette, "palette 3");
        assert!(first.iter().all(|spec| spec.task_id == task.id));
    }

    #[test]
    fn test_derive_specs_rejects_malformed_metadata() {
        let task = task_with_metadata(json!({"note": "no prompt here"}));
        assert!(derive_work_specs(&task).is_err());
    }

    #[test]
    fn test_error_summary_enumerates_reasons() {
        let outcomes = vec![
            failed_outcome(0, FailureKind::Timeout, "exceeded 120s"),
            failed_outcome(1, FailureKind::UpstreamError, "rate limited"),
        ];
        let summary = synthesize_error_summary(&outcomes);
        assert!(summary.starts_with("all 2 variations failed"));
        assert!(summary.contains("unit 0: timeout"));
        assert!(summary.contains("unit 1: upstream_error: rate limited"));
    }

    #[test]
    fn test_error_summary_is_bounded() {
        let outcomes: Vec<WorkOutcome> = (0..100)
            .map(|i| failed_outcome(i, FailureKind::Unknown, &"x".repeat(200)))
            .collect();
        let summary = synthesize_error_summary(&outcomes);
        assert!(summary.len() <= MAX_ERROR_SUMMARY_CHARS + 3);
    }
}
