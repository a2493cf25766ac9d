mod config;
mod docker;
mod error;
mod evaluator;
mod languages;
mod orchestrator;
mod pool;
mod sandbox;

#[cfg(test)]
mod pipeline_tests;

use tokio::signal;
use tracing::{info, warn};

use config::{SandboxDefaults, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Kodewar Worker booting...");

    let config = WorkerConfig::from_env()?;
    let defaults = SandboxDefaults::from_env();

    info!(
        concurrency = config.concurrency,
        max_jobs_per_worker = config.max_jobs_per_worker,
        lane = %config.lane,
        "worker pool configured"
    );
    info!("Connecting to Redis: {}", config.redis_url);

    // Setup graceful shutdown
    let shutdown = async {
        signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
        warn!("Received shutdown signal, stopping workers...");
    };

    tokio::select! {
        _ = pool::run(config, defaults) => {},
        _ = shutdown => {},
    }

    info!("Worker shutdown complete");
    Ok(())
}
