//! # Orchestration
//!
//! The background engine: bounded fan-out over a batch's work units, the
//! claim/finalize protocol, and the reconciliation sweep for tasks whose
//! worker died mid-flight.

pub mod errors;
pub mod fan_out;
pub mod limiter;
pub mod sweeper;
pub mod types;
pub mod work_unit;

pub use errors::{OrchestrationError, OrchestrationResult};
pub use fan_out::{FanOutConfig, FanOutOrchestrator};
pub use limiter::{
    AdaptiveGovernor, ConcurrencyLimiter, LimiterPermit, LimiterStats, PressureSignal,
};
pub use sweeper::{StaleTaskSweeper, SweepReport, SweeperConfig};
pub use types::{
    derive_work_specs, synthesize_error_summary, FailureKind, OrchestrationOutcome, UnitFailure,
    WorkOutcome, WorkSpec,
};
pub use work_unit::WorkUnitExecutor;
