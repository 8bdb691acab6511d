//! # Work Unit Executor
//!
//! Runs one variation end to end: render, persist the blob, record the
//! derived result row. Every invocation is bracketed by a limiter slot and a
//! hard deadline, and every failure mode is folded into a classified
//! [`WorkOutcome`] - nothing escapes this boundary as an error.

use super::limiter::ConcurrencyLimiter;
use super::types::{FailureKind, UnitFailure, WorkOutcome, WorkSpec};
use crate::services::{ArtifactSink, VariationRenderer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Executor for individual work units
pub struct WorkUnitExecutor {
    renderer: Arc<dyn VariationRenderer>,
    sink: Arc<dyn ArtifactSink>,
    limiter: Arc<ConcurrencyLimiter>,
    unit_timeout: Duration,
}

impl WorkUnitExecutor {
    pub fn new(
        renderer: Arc<dyn VariationRenderer>,
        sink: Arc<dyn ArtifactSink>,
        limiter: Arc<ConcurrencyLimiter>,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            sink,
            limiter,
            unit_timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    /// Execute one unit to a terminal outcome. The deadline covers the work
    /// itself, not the wait for a limiter slot, so queued units are not
    /// penalized for a busy batch.
    #[instrument(skip(self), fields(task_id = %spec.task_id, spec_id = spec.spec_id))]
    pub async fn execute(&self, spec: WorkSpec) -> WorkOutcome {
        let queued_at = Instant::now();
        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return WorkOutcome {
                    spec_id: spec.spec_id,
                    result: Err(UnitFailure::new(FailureKind::Unknown, e.to_string())),
                    duration: Duration::ZERO,
                }
            }
        };
        let queue_duration = queued_at.elapsed();

        let started = Instant::now();
        let result = match timeout(self.unit_timeout, self.run(&spec)).await {
            Ok(unit_result) => unit_result,
            Err(_) => Err(UnitFailure::new(
                FailureKind::Timeout,
                format!("unit exceeded its {}s budget", self.unit_timeout.as_secs()),
            )),
        };
        let duration = started.elapsed();
        drop(permit);

        match &result {
            Ok(artifact_id) => debug!(
                artifact_id = %artifact_id,
                queue_ms = queue_duration.as_millis() as u64,
                duration_ms = duration.as_millis() as u64,
                "Work unit completed"
            ),
            Err(failure) => warn!(
                kind = %failure.kind,
                error = %failure.message,
                queue_ms = queue_duration.as_millis() as u64,
                duration_ms = duration.as_millis() as u64,
                "Work unit failed"
            ),
        }

        WorkOutcome {
            spec_id: spec.spec_id,
            result,
            duration,
        }
    }

    /// The render/persist/record sequence, with cleanup-on-abort: a blob
    /// whose result row could not be written is deleted, not leaked.
    async fn run(&self, spec: &WorkSpec) -> Result<Uuid, UnitFailure> {
        let image = self
            .renderer
            .render(spec)
            .await
            .map_err(|e| UnitFailure::new(FailureKind::UpstreamError, e.to_string()))?;

        let artifact_id = self
            .sink
            .store_image(spec.task_id, spec, &image)
            .await
            .map_err(|e| UnitFailure::new(FailureKind::StorageError, e.to_string()))?;

        if let Err(e) = self.sink.record_variation(spec.task_id, spec, artifact_id).await {
            if let Err(cleanup) = self.sink.delete_image(artifact_id).await {
                warn!(
                    artifact_id = %artifact_id,
                    error = %cleanup,
                    "Failed to roll back orphaned artifact"
                );
            }
            return Err(UnitFailure::new(FailureKind::StorageError, e.to_string()));
        }

        Ok(artifact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingSink, ScriptedRenderer, UnitBehavior};
    use uuid::Uuid;

    fn spec(spec_id: usize) -> WorkSpec {
        WorkSpec {
            spec_id,
            task_id: Uuid::new_v4(),
            prompt: "paper cranes over water".to_string(),
            palette: format!("palette {}", spec_id + 1),
        }
    }

    fn executor(
        renderer: ScriptedRenderer,
        sink: RecordingSink,
        unit_timeout: Duration,
    ) -> WorkUnitExecutor {
        WorkUnitExecutor::new(
            Arc::new(renderer),
            Arc::new(sink),
            Arc::new(ConcurrencyLimiter::new(2)),
            unit_timeout,
        )
    }

    #[tokio::test]
    async fn test_successful_unit_records_variation() {
        let renderer = ScriptedRenderer::default();
        let sink = RecordingSink::default();
        let recorded = sink.recorded_variations();
        let exec = executor(renderer, sink, Duration::from_secs(5));

        let outcome = exec.execute(spec(0)).await;
        assert!(outcome.succeeded());
        assert_eq!(recorded.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_renderer_error_classified_upstream() {
        let renderer =
            ScriptedRenderer::default().with_behavior(0, UnitBehavior::FailRender("quota".into()));
        let exec = executor(renderer, RecordingSink::default(), Duration::from_secs(5));

        let outcome = exec.execute(spec(0)).await;
        let failure = outcome.result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::UpstreamError);
        assert!(failure.message.contains("quota"));
    }

    #[tokio::test]
    async fn test_hang_is_classified_timeout() {
        let renderer = ScriptedRenderer::default().with_behavior(0, UnitBehavior::Hang);
        let exec = executor(renderer, RecordingSink::default(), Duration::from_millis(50));

        let started = Instant::now();
        let outcome = exec.execute(spec(0)).await;
        assert_eq!(outcome.result.unwrap_err().kind, FailureKind::Timeout);
        // Terminal within timeout + scheduling slack
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_record_failure_rolls_back_blob() {
        let renderer = ScriptedRenderer::default();
        let sink = RecordingSink::default().failing_record();
        let deleted = sink.deleted_artifacts();
        let exec = executor(renderer, sink, Duration::from_secs(5));

        let outcome = exec.execute(spec(0)).await;
        assert_eq!(outcome.result.unwrap_err().kind, FailureKind::StorageError);
        assert_eq!(deleted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_nothing_to_clean() {
        let renderer = ScriptedRenderer::default();
        let sink = RecordingSink::default().failing_store();
        let deleted = sink.deleted_artifacts();
        let exec = executor(renderer, sink, Duration::from_secs(5));

        let outcome = exec.execute(spec(0)).await;
        assert_eq!(outcome.result.unwrap_err().kind, FailureKind::StorageError);
        assert!(deleted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_outcome_spec_id_matches_input() {
        let exec = executor(
            ScriptedRenderer::default(),
            RecordingSink::default(),
            Duration::from_secs(5),
        );
        let outcome = exec.execute(spec(7)).await;
        assert_eq!(outcome.spec_id, 7);
    }
}
