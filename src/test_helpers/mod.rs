//! Test doubles for the collaborator seams, shared between unit tests and
//! the integration suite. Behaviors are scripted per spec id so a single
//! batch can mix successes, classified failures, and hangs.

use crate::models::{GenerationTask, TaskType};
use crate::orchestration::limiter::PressureSignal;
use crate::orchestration::types::WorkSpec;
use crate::services::{ArtifactSink, RenderError, RenderedImage, SinkError, VariationRenderer};
use crate::state_machine::TaskStatus;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What a scripted renderer does for one spec id
#[derive(Debug, Clone)]
pub enum UnitBehavior {
    /// Render successfully after the given delay
    Succeed(Duration),
    /// Return an upstream error
    FailRender(String),
    /// Never return; only a timeout ends this unit
    Hang,
}

impl Default for UnitBehavior {
    fn default() -> Self {
        Self::Succeed(Duration::ZERO)
    }
}

/// Renderer whose behavior is scripted per spec id; unscripted specs succeed
/// immediately
#[derive(Default)]
pub struct ScriptedRenderer {
    behaviors: Mutex<HashMap<usize, UnitBehavior>>,
    renders_started: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn with_behavior(self, spec_id: usize, behavior: UnitBehavior) -> Self {
        self.behaviors.lock().insert(spec_id, behavior);
        self
    }

    pub fn with_all_delayed(self, count: usize, delay: Duration) -> Self {
        {
            let mut behaviors = self.behaviors.lock();
            for spec_id in 0..count {
                behaviors.insert(spec_id, UnitBehavior::Succeed(delay));
            }
        }
        self
    }

    /// How many render calls have started, across all specs
    pub fn renders_started(&self) -> usize {
        self.renders_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariationRenderer for ScriptedRenderer {
    async fn render(&self, spec: &WorkSpec) -> Result<RenderedImage, RenderError> {
        self.renders_started.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .get(&spec.spec_id)
            .cloned()
            .unwrap_or_default();

        match behavior {
            UnitBehavior::Succeed(delay) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(RenderedImage::png(vec![0x89, 0x50, 0x4e, 0x47]))
            }
            UnitBehavior::FailRender(message) => Err(RenderError::Upstream(message)),
            UnitBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("hung unit outlived every sane test timeout")
            }
        }
    }
}

/// Sink that records variations in memory, with switchable failure points
#[derive(Default)]
pub struct RecordingSink {
    variations: Arc<Mutex<Vec<(Uuid, usize, Uuid)>>>,
    deleted: Arc<Mutex<Vec<Uuid>>>,
    fail_store: AtomicBool,
    fail_record: AtomicBool,
}

impl RecordingSink {
    pub fn failing_store(self) -> Self {
        self.fail_store.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_record(self) -> Self {
        self.fail_record.store(true, Ordering::SeqCst);
        self
    }

    /// Recorded `(task_id, spec_id, artifact_id)` triples
    pub fn recorded_variations(&self) -> Arc<Mutex<Vec<(Uuid, usize, Uuid)>>> {
        Arc::clone(&self.variations)
    }

    pub fn deleted_artifacts(&self) -> Arc<Mutex<Vec<Uuid>>> {
        Arc::clone(&self.deleted)
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn store_image(
        &self,
        _task_id: Uuid,
        _spec: &WorkSpec,
        _image: &RenderedImage,
    ) -> Result<Uuid, SinkError> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(SinkError::storage("store_image", "bucket unavailable"));
        }
        Ok(Uuid::new_v4())
    }

    async fn record_variation(
        &self,
        task_id: Uuid,
        spec: &WorkSpec,
        artifact_id: Uuid,
    ) -> Result<(), SinkError> {
        if self.fail_record.load(Ordering::SeqCst) {
            return Err(SinkError::storage("record_variation", "row insert failed"));
        }
        self.variations.lock().push((task_id, spec.spec_id, artifact_id));
        Ok(())
    }

    async fn delete_image(&self, artifact_id: Uuid) -> Result<(), SinkError> {
        self.deleted.lock().push(artifact_id);
        Ok(())
    }
}

/// Manually driven pressure signal for adaptive limiter tests
#[derive(Default)]
pub struct StaticPressureSignal {
    pressured: AtomicBool,
}

impl StaticPressureSignal {
    pub fn set_pressure(&self, pressured: bool) {
        self.pressured.store(pressured, Ordering::SeqCst);
    }
}

impl PressureSignal for StaticPressureSignal {
    fn under_pressure(&self) -> bool {
        self.pressured.load(Ordering::SeqCst)
    }
}

/// A pending palette-batch task with sensible metadata
pub fn batch_task(palette_count: usize) -> GenerationTask {
    GenerationTask::new(
        Uuid::new_v4(),
        TaskType::PaletteBatch,
        json!({
            "prompt": "terraced hills after rain",
            "palette_count": palette_count,
        }),
    )
}

/// Same, but already in the given status with the given timestamps
pub fn batch_task_with_status(
    palette_count: usize,
    status: TaskStatus,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> GenerationTask {
    let mut task = batch_task(palette_count);
    task.status = status;
    task.created_at = created_at;
    task.updated_at = updated_at;
    if status == TaskStatus::Failed {
        task.error_message = Some("seeded failure".to_string());
    }
    if status == TaskStatus::Completed {
        task.result_ref = Some(Uuid::new_v4());
    }
    task
}
