//! Stale Task Sweeper Binary
//!
//! Standalone scheduled-invocation host for the reconciliation sweep. Runs
//! sweep passes on the configured cadence against Postgres until ctrl-c.

use anyhow::Context;
use chroma_core::config::ChromaConfig;
use chroma_core::events::EventPublisher;
use chroma_core::logging::init_structured_logging;
use chroma_core::orchestration::{StaleTaskSweeper, SweeperConfig};
use chroma_core::store::PgTaskStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = ChromaConfig::from_env().context("loading configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("connecting to the task store")?;

    let store = Arc::new(PgTaskStore::new(pool));
    let sweeper = StaleTaskSweeper::with_config(
        store,
        EventPublisher::new(config.event_capacity),
        SweeperConfig {
            pending_ttl: config.pending_ttl,
            processing_ttl: config.processing_ttl,
            sweep_interval: config.sweep_interval,
        },
    );

    info!("chroma-sweeper starting");
    sweeper
        .run_until(async {
            let _ = signal::ctrl_c().await;
        })
        .await;
    info!("chroma-sweeper stopped");

    Ok(())
}
