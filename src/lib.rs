#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chroma Core
//!
//! Background task engine for the Chroma palette rendering service.
//!
//! ## Overview
//!
//! One client request becomes a generation task: a base visual concept plus a
//! configurable number of independent color-palette variations. This crate is
//! the part that makes that reliable on cheap workers - the task state
//! machine, the bounded fan-out over work units, the conditional-update claim
//! protocol that makes redelivered triggers safe, and the periodic sweep that
//! reconciles tasks whose worker died mid-flight.
//!
//! The web surface, the image-generation calls, blob storage, and push
//! notifications all live elsewhere; they show up here only as traits.
//!
//! ## Module Organization
//!
//! - [`models`] - The persisted generation task and its parsed request forms
//! - [`state_machine`] - Pure transition table plus the conditional-update transitioner
//! - [`store`] - Task store trait with Postgres and in-memory implementations
//! - [`orchestration`] - Fan-out orchestrator, work unit executor, limiter, sweeper
//! - [`events`] - Lifecycle event publisher (the push-notification seam)
//! - [`services`] - Renderer and artifact-persistence seams
//! - [`config`] - Environment-derived runtime configuration
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chroma_core::config::ChromaConfig;
//! use chroma_core::orchestration::{ConcurrencyLimiter, FanOutOrchestrator, WorkUnitExecutor};
//! use chroma_core::events::EventPublisher;
//! use chroma_core::store::InMemoryTaskStore;
//! use std::sync::Arc;
//!
//! # use chroma_core::services::{VariationRenderer, ArtifactSink};
//! # async fn example(renderer: Arc<dyn VariationRenderer>, sink: Arc<dyn ArtifactSink>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChromaConfig::default();
//! let store = Arc::new(InMemoryTaskStore::new());
//! let limiter = Arc::new(ConcurrencyLimiter::new(config.limiter_capacity));
//! let executor = Arc::new(WorkUnitExecutor::new(renderer, sink, limiter, config.unit_timeout));
//! let orchestrator = FanOutOrchestrator::new(store, executor, EventPublisher::default());
//!
//! // Trigger deliveries call this; duplicates collapse into one execution
//! // orchestrator.process_task(task_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod store;
pub mod test_helpers;

pub use config::ChromaConfig;
pub use constants::{defaults, events as event_names, sweep_reasons, system};
pub use error::{ChromaError, Result};
pub use models::{BatchRequest, GenerationTask, TaskType};
pub use orchestration::{
    ConcurrencyLimiter, FanOutOrchestrator, OrchestrationOutcome, StaleTaskSweeper, SweepReport,
    WorkUnitExecutor,
};
pub use state_machine::{TaskEvent, TaskStatus, TaskTransitioner, TransitionOutcome};
pub use store::{TaskStore, TransitionUpdate};
