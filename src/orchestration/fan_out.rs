//! # Fan-Out Orchestrator
//!
//! ## Architecture: Claim, Fan Out, Aggregate
//!
//! One trigger invocation turns a pending task into N concurrently-running
//! work units and folds their outcomes back into a single terminal status.
//! The claim is a conditional update, so redelivered triggers and concurrent
//! workers collapse into exactly one execution; everything after the claim is
//! isolation: per-unit timeouts, no sibling cancellation, and a full-barrier
//! join that waits for every unit before deciding the batch.
//!
//! ## Key Behaviors
//!
//! - **Idempotent entry**: a lost claim is a no-op, not an error
//! - **Partial success**: one good variation completes the task; failures are
//!   counted in metadata and logged, never fatal on their own
//! - **Liveness**: a heartbeat touches `updated_at` while units run so the
//!   sweeper can tell a slow batch from a dead worker
//! - **Crash semantics**: a fault between claim and finalization leaves the
//!   task `processing` on purpose - the sweeper owns that recovery path

use super::errors::{OrchestrationError, OrchestrationResult};
use super::types::{
    derive_work_specs, synthesize_error_summary, FailureKind, OrchestrationOutcome, UnitFailure,
    WorkOutcome,
};
use super::work_unit::WorkUnitExecutor;
use crate::constants::events as event_names;
use crate::events::EventPublisher;
use crate::state_machine::{TaskEvent, TaskStatus, TaskTransitioner, TransitionOutcome};
use crate::store::TaskStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Configuration for one orchestrator instance
#[derive(Debug, Clone)]
pub struct FanOutConfig {
    /// Cadence of the `updated_at` heartbeat while units are running
    pub heartbeat_interval: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: crate::constants::defaults::HEARTBEAT_INTERVAL,
        }
    }
}

/// Orchestrates the full lifecycle of one generation batch
pub struct FanOutOrchestrator {
    store: Arc<dyn TaskStore>,
    transitioner: TaskTransitioner,
    executor: Arc<WorkUnitExecutor>,
    publisher: EventPublisher,
    config: FanOutConfig,
}

impl FanOutOrchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        executor: Arc<WorkUnitExecutor>,
        publisher: EventPublisher,
    ) -> Self {
        Self::with_config(store, executor, publisher, FanOutConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn TaskStore>,
        executor: Arc<WorkUnitExecutor>,
        publisher: EventPublisher,
        config: FanOutConfig,
    ) -> Self {
        let transitioner = TaskTransitioner::new(Arc::clone(&store), publisher.clone());
        Self {
            store,
            transitioner,
            executor,
            publisher,
            config,
        }
    }

    /// Process one task to a terminal status. Safe to invoke repeatedly and
    /// concurrently for the same id: exactly one invocation wins the claim,
    /// the rest observe [`OrchestrationOutcome::ClaimConflict`] and do no work.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn process_task(&self, task_id: Uuid) -> OrchestrationResult<OrchestrationOutcome> {
        let task = self
            .store
            .get(task_id)
            .await?
            .ok_or(OrchestrationError::TaskNotFound { task_id })?;

        let claim = self
            .transitioner
            .apply(task_id, TaskStatus::Pending, TaskEvent::Claim, None)
            .await?;
        if claim == TransitionOutcome::Conflict {
            debug!(task_id = %task_id, "Claim lost; task already owned or finalized");
            return Ok(OrchestrationOutcome::ClaimConflict);
        }

        let specs = match derive_work_specs(&task) {
            Ok(specs) => specs,
            Err(reason) => {
                warn!(task_id = %task_id, reason = %reason, "Claimed task has unusable metadata");
                self.transitioner
                    .apply(
                        task_id,
                        TaskStatus::Processing,
                        TaskEvent::fail_with_reason(reason),
                        None,
                    )
                    .await?;
                return Ok(OrchestrationOutcome::Failed { failed: 0 });
            }
        };

        info!(
            task_id = %task_id,
            variations = specs.len(),
            "🎨 Batch claimed; fanning out"
        );

        let heartbeat = self.spawn_heartbeat(task_id);
        let outcomes = self.dispatch_all(specs).await;
        heartbeat.abort();

        self.publish_unit_events(task_id, &outcomes).await;
        self.finalize(task_id, outcomes).await
    }

    /// Dispatch every spec as its own spawned unit and wait for all of them.
    /// A failing or slow unit never cancels its siblings; a panicked unit
    /// folds into an unknown-classified outcome for that spec alone.
    async fn dispatch_all(&self, specs: Vec<super::types::WorkSpec>) -> Vec<WorkOutcome> {
        let spec_ids: Vec<usize> = specs.iter().map(|spec| spec.spec_id).collect();
        let handles = specs.into_iter().map(|spec| {
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move { executor.execute(spec).await })
        });

        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(spec_ids)
            .map(|(joined, spec_id)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(spec_id = spec_id, error = %e, "Work unit task panicked");
                    WorkOutcome {
                        spec_id,
                        result: Err(UnitFailure::new(FailureKind::Unknown, e.to_string())),
                        duration: Duration::ZERO,
                    }
                }
            })
            .collect()
    }

    /// Apply the aggregate policy and finalize the task with the same
    /// conditional-update discipline as the claim, so a concurrent sweep
    /// cannot be half-overwritten.
    async fn finalize(
        &self,
        task_id: Uuid,
        outcomes: Vec<WorkOutcome>,
    ) -> OrchestrationResult<OrchestrationOutcome> {
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let failed = outcomes.len() - succeeded;

        // Primary artifact: first success in spec order
        let primary = outcomes.iter().find_map(WorkOutcome::artifact_id);

        let (event, metadata_patch) = match primary {
            Some(result_ref) => (
                TaskEvent::Complete { result_ref },
                (failed > 0).then(|| json!({ "failed_variations": failed })),
            ),
            None => (
                TaskEvent::fail_with_reason(synthesize_error_summary(&outcomes)),
                None,
            ),
        };

        let transition = self
            .transitioner
            .apply(task_id, TaskStatus::Processing, event, metadata_patch)
            .await?;

        match transition {
            TransitionOutcome::Conflict => {
                warn!(
                    task_id = %task_id,
                    succeeded = succeeded,
                    failed = failed,
                    "Finalization lost to a concurrent transition (sweeper likely won)"
                );
                Ok(OrchestrationOutcome::FinalizeConflict { succeeded, failed })
            }
            TransitionOutcome::Applied(TaskStatus::Completed) => {
                info!(
                    task_id = %task_id,
                    succeeded = succeeded,
                    failed = failed,
                    "🟢 Batch completed"
                );
                Ok(OrchestrationOutcome::Completed {
                    // `primary` is Some on this branch by construction
                    result_ref: primary.unwrap_or_default(),
                    succeeded,
                    failed,
                })
            }
            TransitionOutcome::Applied(_) => {
                info!(task_id = %task_id, failed = failed, "🔴 Batch failed; no variation succeeded");
                Ok(OrchestrationOutcome::Failed { failed })
            }
        }
    }

    async fn publish_unit_events(&self, task_id: Uuid, outcomes: &[WorkOutcome]) {
        for outcome in outcomes {
            let (name, context) = match &outcome.result {
                Ok(artifact_id) => (
                    event_names::VARIATION_COMPLETED,
                    json!({
                        "task_id": task_id,
                        "spec_id": outcome.spec_id,
                        "artifact_id": artifact_id,
                        "duration_ms": outcome.duration.as_millis() as u64,
                    }),
                ),
                Err(failure) => (
                    event_names::VARIATION_FAILED,
                    json!({
                        "task_id": task_id,
                        "spec_id": outcome.spec_id,
                        "kind": failure.kind,
                        "error": failure.message,
                        "duration_ms": outcome.duration.as_millis() as u64,
                    }),
                ),
            };
            let _ = self.publisher.publish(name, context).await;
        }
    }

    /// Periodically bump `updated_at` so a long batch stays out of the
    /// sweeper's stale window. Stops the moment the handle is aborted.
    fn spawn_heartbeat(&self, task_id: Uuid) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let interval = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so the claim's own
            // timestamp update is the initial liveness signal
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.touch(task_id).await {
                    Ok(true) => debug!(task_id = %task_id, "Heartbeat"),
                    Ok(false) => {
                        debug!(task_id = %task_id, "Heartbeat skipped; task no longer processing");
                        break;
                    }
                    Err(e) => warn!(task_id = %task_id, error = %e, "Heartbeat failed"),
                }
            }
        })
    }
}
