use crate::constants::defaults;
use crate::error::{ChromaError, Result};
use std::time::Duration;

/// Runtime configuration for the generation engine.
///
/// Values come from the environment with typed defaults; every knob maps to
/// a `CHROMA_*` variable so deployments can tune the worker without a rebuild.
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub database_url: String,
    /// Concurrent work units admitted per process
    pub limiter_capacity: usize,
    /// Hard per-unit time budget
    pub unit_timeout: Duration,
    /// Liveness touch cadence during processing
    pub heartbeat_interval: Duration,
    /// Age threshold for reaping unclaimed pending tasks
    pub pending_ttl: Duration,
    /// Silence threshold for reaping stalled processing tasks
    pub processing_ttl: Duration,
    /// Cadence of the reconciliation sweep loop
    pub sweep_interval: Duration,
    /// Broadcast capacity of the lifecycle event publisher
    pub event_capacity: usize,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/chroma_development".to_string(),
            limiter_capacity: defaults::LIMITER_CAPACITY,
            unit_timeout: defaults::UNIT_TIMEOUT,
            heartbeat_interval: defaults::HEARTBEAT_INTERVAL,
            pending_ttl: defaults::PENDING_TTL,
            processing_ttl: defaults::PROCESSING_TTL,
            sweep_interval: defaults::SWEEP_INTERVAL,
            event_capacity: defaults::EVENT_CAPACITY,
        }
    }
}

impl ChromaConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(capacity) = std::env::var("CHROMA_LIMITER_CAPACITY") {
            config.limiter_capacity = capacity.parse().map_err(|e| {
                ChromaError::ConfigurationError(format!("Invalid limiter_capacity: {e}"))
            })?;
        }

        if let Ok(secs) = std::env::var("CHROMA_UNIT_TIMEOUT_SECS") {
            config.unit_timeout = parse_secs("unit_timeout_secs", &secs)?;
        }

        if let Ok(secs) = std::env::var("CHROMA_HEARTBEAT_INTERVAL_SECS") {
            config.heartbeat_interval = parse_secs("heartbeat_interval_secs", &secs)?;
        }

        if let Ok(secs) = std::env::var("CHROMA_PENDING_TTL_SECS") {
            config.pending_ttl = parse_secs("pending_ttl_secs", &secs)?;
        }

        if let Ok(secs) = std::env::var("CHROMA_PROCESSING_TTL_SECS") {
            config.processing_ttl = parse_secs("processing_ttl_secs", &secs)?;
        }

        if let Ok(secs) = std::env::var("CHROMA_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = parse_secs("sweep_interval_secs", &secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limiter_capacity == 0 {
            return Err(ChromaError::ConfigurationError(
                "limiter_capacity must be at least 1".to_string(),
            ));
        }

        if self.processing_ttl < self.unit_timeout * 2 {
            return Err(ChromaError::ConfigurationError(format!(
                "processing_ttl ({}s) must be at least twice unit_timeout ({}s)",
                self.processing_ttl.as_secs(),
                self.unit_timeout.as_secs()
            )));
        }

        Ok(())
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .parse()
        .map_err(|e| ChromaError::ConfigurationError(format!("Invalid {name}: {e}")))?;
    Ok(Duration::from_secs(secs))
}
