//! # Stale Task Sweeper
//!
//! Periodic reconciliation pass over the task store, independent of any one
//! task's lifecycle. Two thresholds give operators two distinct diagnostics:
//! a `pending` task past its claim window was never picked up, while a
//! `processing` task whose heartbeat went quiet belonged to a worker that
//! died mid-flight. Both are force-failed through the same conditional
//! updates the orchestrator uses, so sweeping never races a live finalization
//! into a corrupt state and re-running a sweep is harmless.

use super::errors::OrchestrationResult;
use crate::constants::{events as event_names, sweep_reasons};
use crate::events::EventPublisher;
use crate::models::GenerationTask;
use crate::state_machine::{TaskEvent, TaskStatus, TaskTransitioner, TransitionOutcome};
use crate::store::TaskStore;
use chrono::Utc;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Configuration for sweep thresholds and cadence
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Age after which an unclaimed pending task is reaped (`created_at` based)
    pub pending_ttl: Duration,
    /// Silence after which a processing task is reaped (`updated_at` based)
    pub processing_ttl: Duration,
    /// Cadence of the [`StaleTaskSweeper::run_until`] loop
    pub sweep_interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            pending_ttl: crate::constants::defaults::PENDING_TTL,
            processing_ttl: crate::constants::defaults::PROCESSING_TTL,
            sweep_interval: crate::constants::defaults::SWEEP_INTERVAL,
        }
    }
}

/// Result of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending tasks transitioned to failed ("never claimed")
    pub failed_pending: usize,
    /// Processing tasks transitioned to failed (worker stalled or crashed)
    pub failed_processing: usize,
    /// Candidates that transitioned under us while sweeping; nothing to do
    pub lost_races: usize,
}

impl SweepReport {
    pub fn total_failed(&self) -> usize {
        self.failed_pending + self.failed_processing
    }
}

/// Reconciles tasks whose liveness signal exceeded its threshold
pub struct StaleTaskSweeper {
    store: Arc<dyn TaskStore>,
    transitioner: TaskTransitioner,
    publisher: EventPublisher,
    config: SweeperConfig,
}

impl StaleTaskSweeper {
    pub fn new(store: Arc<dyn TaskStore>, publisher: EventPublisher) -> Self {
        Self::with_config(store, publisher, SweeperConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn TaskStore>,
        publisher: EventPublisher,
        config: SweeperConfig,
    ) -> Self {
        let transitioner = TaskTransitioner::new(Arc::clone(&store), publisher.clone());
        Self {
            store,
            transitioner,
            publisher,
            config,
        }
    }

    /// One full reconciliation pass. Idempotent: terminal tasks never match
    /// the stale queries, and a candidate that finalizes mid-sweep simply
    /// loses nothing but its spot in the report.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> OrchestrationResult<SweepReport> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        // An unrepresentable TTL (absurdly large) means nothing is ever stale
        let pending_cutoff = now
            - chrono::Duration::from_std(self.config.pending_ttl)
                .unwrap_or_else(|_| chrono::Duration::days(36500));
        let stale_pending = self.store.stale_pending(pending_cutoff).await?;
        for task in &stale_pending {
            if self
                .reap(task, TaskStatus::Pending, sweep_reasons::NEVER_CLAIMED)
                .await?
            {
                report.failed_pending += 1;
            } else {
                report.lost_races += 1;
            }
        }

        let processing_cutoff = now
            - chrono::Duration::from_std(self.config.processing_ttl)
                .unwrap_or_else(|_| chrono::Duration::days(36500));
        let stale_processing = self.store.stale_processing(processing_cutoff).await?;
        for task in &stale_processing {
            if self
                .reap(task, TaskStatus::Processing, sweep_reasons::WORKER_STALLED)
                .await?
            {
                report.failed_processing += 1;
            } else {
                report.lost_races += 1;
            }
        }

        if report.total_failed() > 0 || report.lost_races > 0 {
            info!(
                failed_pending = report.failed_pending,
                failed_processing = report.failed_processing,
                lost_races = report.lost_races,
                "🧹 Sweep pass reconciled stale tasks"
            );
        }

        Ok(report)
    }

    /// Force-fail one stale candidate. The conditional update only wins if
    /// the task is still in the state the query saw.
    async fn reap(
        &self,
        task: &GenerationTask,
        expected: TaskStatus,
        reason: &str,
    ) -> OrchestrationResult<bool> {
        let outcome = self
            .transitioner
            .apply(
                task.id,
                expected,
                TaskEvent::fail_with_reason(reason),
                None,
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(_) => {
                warn!(
                    task_id = %task.id,
                    was = %expected,
                    reason = %reason,
                    "Stale task force-failed"
                );
                let _ = self
                    .publisher
                    .publish(
                        event_names::TASK_SWEPT,
                        json!({
                            "task_id": task.id,
                            "was": expected,
                            "reason": reason,
                        }),
                    )
                    .await;
                Ok(true)
            }
            TransitionOutcome::Conflict => Ok(false),
        }
    }

    /// Run sweep passes on the configured cadence until `shutdown` resolves.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            pending_ttl_secs = self.config.pending_ttl.as_secs(),
            processing_ttl_secs = self.config.processing_ttl.as_secs(),
            "Stale task sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "Sweep pass failed; will retry on next tick");
                    }
                }
                _ = &mut shutdown => {
                    info!("Stale task sweeper shutting down");
                    break;
                }
            }
        }
    }
}
