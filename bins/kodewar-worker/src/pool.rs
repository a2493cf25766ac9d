//! Bounded worker pool.
//!
//! Spawns `concurrency` independent worker slots. Each slot runs one
//! submission at a time and fetches the next job only after the previous
//! one has fully finished, so live sandbox count never exceeds pool size.
//! After `max_jobs_per_worker` completions a slot tears down its Docker and
//! Redis clients and rebuilds them, shedding any accumulated client state.

use std::time::Duration;

use anyhow::{Context, Result};
use bollard::Docker;
use redis::aio::ConnectionManager;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use kodewar_common::{queue, store};

use crate::config::{SandboxDefaults, WorkerConfig};
use crate::docker::DockerSandbox;
use crate::orchestrator::Orchestrator;

/// Run the pool until the surrounding task is cancelled.
pub async fn run(config: WorkerConfig, defaults: SandboxDefaults) -> Result<()> {
    let mut workers = JoinSet::new();

    for worker_id in 0..config.concurrency {
        let config = config.clone();
        let defaults = defaults.clone();
        workers.spawn(async move { worker_task(worker_id, config, defaults).await });
    }

    // Worker tasks loop forever; this only resolves if one panics.
    while let Some(finished) = workers.join_next().await {
        if let Err(e) = finished {
            error!(error = %e, "worker task aborted");
        }
    }

    Ok(())
}

async fn worker_task(worker_id: usize, config: WorkerConfig, defaults: SandboxDefaults) {
    loop {
        match worker_generation(worker_id, &config, &defaults).await {
            Ok(completed) => {
                info!(worker_id, completed_jobs = completed, "recycling worker clients");
            }
            Err(e) => {
                error!(worker_id, error = %e, "worker generation failed, restarting");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// One client generation: fresh Docker and Redis handles, a bounded number
/// of jobs, then return so the caller can rebuild.
#[instrument(skip(config, defaults))]
async fn worker_generation(
    worker_id: usize,
    config: &WorkerConfig,
    defaults: &SandboxDefaults,
) -> Result<u64> {
    let client = redis::Client::open(config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let mut redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    let docker = Docker::connect_with_local_defaults()
        .context("Failed to connect to Docker daemon")?;
    let orchestrator = Orchestrator::new(DockerSandbox::new(docker), defaults.clone());

    debug!(worker_id, lane = %config.lane, "worker generation started");

    let mut completed = 0u64;
    while completed < config.max_jobs_per_worker {
        // BLPOP with a short timeout so shutdown is never far away.
        match queue::dequeue(&mut redis_conn, config.lane, config.poll_timeout_secs).await {
            Ok(Some(submission)) => {
                info!(
                    worker_id,
                    submission_id = %submission.id,
                    language = %submission.language,
                    test_cases = submission.test_cases.len(),
                    code_size = submission.code.len(),
                    "picked up submission"
                );

                let start = std::time::Instant::now();
                let result = orchestrator.process(&submission).await;

                info!(
                    worker_id,
                    submission_id = %submission.id,
                    status = ?result.status,
                    execution_ms = start.elapsed().as_millis() as u64,
                    "submission processed"
                );

                match store::write_result(&mut redis_conn, &result).await {
                    Ok(_) => {
                        debug!(submission_id = %submission.id, "result persisted");
                    }
                    Err(e) => {
                        error!(submission_id = %submission.id, error = %e, "failed to persist result");
                        // Non-fatal - worker continues
                    }
                }

                completed += 1;
            }
            Ok(None) => {
                // Poll timeout - loop again
                continue;
            }
            Err(e) => {
                error!(worker_id, error = %e, "broker error while polling");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    Ok(completed)
}
