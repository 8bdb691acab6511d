//! Collaborator seams for the opaque parts of a work unit: the upstream
//! generation call and artifact persistence. Production implementations live
//! with the hosting service; the engine only depends on these traits so the
//! executor's timeout and failure classification can be tested hermetically.

use crate::orchestration::types::WorkSpec;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// One rendered variation, ready to persist
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RenderedImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/png".to_string(),
        }
    }
}

/// Errors from the upstream generation service
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("upstream generation failed: {0}")]
    Upstream(String),

    #[error("upstream rejected the request: {0}")]
    InvalidRequest(String),
}

/// Errors from artifact persistence
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("artifact storage failed: {operation}: {message}")]
    Storage { operation: String, message: String },
}

impl SinkError {
    pub fn storage(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Applies one palette to the base concept. Opaque, fallible, and slow; the
/// executor brackets every call with its own deadline.
#[async_trait]
pub trait VariationRenderer: Send + Sync {
    async fn render(&self, spec: &WorkSpec) -> Result<RenderedImage, RenderError>;
}

/// Persists a rendered variation: the blob first, then the derived result
/// row the client polls for. `delete_image` exists so a failed row write can
/// roll the blob back instead of leaking it.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn store_image(
        &self,
        task_id: Uuid,
        spec: &WorkSpec,
        image: &RenderedImage,
    ) -> Result<Uuid, SinkError>;

    async fn record_variation(
        &self,
        task_id: Uuid,
        spec: &WorkSpec,
        artifact_id: Uuid,
    ) -> Result<(), SinkError>;

    async fn delete_image(&self, artifact_id: Uuid) -> Result<(), SinkError>;
}
