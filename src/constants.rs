//! # System Constants
//!
//! Core constants and enums that define the operational boundaries of the
//! Chroma background generation engine: lifecycle event names, sweep reasons,
//! and system-wide defaults shared by the orchestrator and the sweeper.

// Re-export the status type for convenience
pub use crate::state_machine::TaskStatus;

/// Lifecycle events published on every observable transition
pub mod events {
    // Task lifecycle events
    pub const TASK_CLAIMED: &str = "task.claimed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_SWEPT: &str = "task.swept";

    // Per-variation lifecycle events
    pub const VARIATION_COMPLETED: &str = "variation.completed";
    pub const VARIATION_FAILED: &str = "variation.failed";
}

/// Failure reasons synthesized by the stale task sweeper
pub mod sweep_reasons {
    /// Task sat in `pending` past the claim threshold
    pub const NEVER_CLAIMED: &str = "never claimed";

    /// Task sat in `processing` past the liveness threshold
    pub const WORKER_STALLED: &str = "processing timed out or worker crashed";
}

/// System-wide constants
pub mod system {
    /// Version compatibility marker
    pub const CHROMA_CORE_VERSION: &str = "0.1.0";

    /// Hard ceiling on the number of variations a single batch may request
    pub const MAX_VARIATIONS_PER_BATCH: usize = 16;

    /// Maximum length of a synthesized `error_message`, to keep the task row bounded
    pub const MAX_ERROR_SUMMARY_CHARS: usize = 1024;
}

/// Built-in defaults, overridable through [`crate::config::ChromaConfig`]
pub mod defaults {
    use std::time::Duration;

    /// Concurrent work units admitted per process
    pub const LIMITER_CAPACITY: usize = 3;

    /// Hard per-unit time budget covering render and persistence
    pub const UNIT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Liveness touch cadence while a task is processing
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

    /// Age after which an unclaimed `pending` task is declared dead
    pub const PENDING_TTL: Duration = Duration::from_secs(30 * 60);

    /// Silence after which a `processing` task is declared dead.
    /// Must stay comfortably above 2x [`UNIT_TIMEOUT`].
    pub const PROCESSING_TTL: Duration = Duration::from_secs(20 * 60);

    /// Cadence of the reconciliation sweep
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

    /// Broadcast channel capacity for the event publisher
    pub const EVENT_CAPACITY: usize = 1000;
}
