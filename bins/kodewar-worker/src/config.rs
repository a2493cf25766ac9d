// Runtime configuration for the kodewar worker
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::env;

use kodewar_common::queue::QueueLane;

use crate::sandbox::{ResourceConfig, Ulimits};

/// Pool and broker settings, read once at boot.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    /// Concurrent executions this process may run.
    pub concurrency: usize,
    /// Jobs a worker slot completes before its clients are rebuilt.
    pub max_jobs_per_worker: u64,
    pub lane: QueueLane,
    /// BLPOP timeout; bounds how long shutdown can lag.
    pub poll_timeout_secs: f64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let concurrency = match env::var("WORKER_CONCURRENCY") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("WORKER_CONCURRENCY must be an integer: {}", raw))?,
            Err(_) => 4,
        };
        if concurrency == 0 {
            bail!("WORKER_CONCURRENCY must be positive");
        }

        let max_jobs_per_worker = match env::var("WORKER_MAX_JOBS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("WORKER_MAX_JOBS must be an integer: {}", raw))?,
            Err(_) => 1000,
        };
        if max_jobs_per_worker == 0 {
            bail!("WORKER_MAX_JOBS must be positive");
        }

        let lane = match env::var("WORKER_LANE") {
            Ok(name) => match QueueLane::from_name(&name) {
                Some(lane) => lane,
                None => bail!("unknown queue lane: {}", name),
            },
            Err(_) => QueueLane::CodeExecution,
        };

        Ok(Self {
            redis_url,
            concurrency,
            max_jobs_per_worker,
            lane,
            poll_timeout_secs: 5.0,
        })
    }
}

/// Sandbox knobs that do not vary per submission. The memory ceiling comes
/// from the submission itself; everything else is deployment policy.
#[derive(Debug, Clone)]
pub struct SandboxDefaults {
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub seccomp_profile: String,
    pub nofile: i64,
    pub nproc: i64,
    pub memlock_bytes: i64,
}

impl Default for SandboxDefaults {
    fn default() -> Self {
        Self {
            cpu_period: 100_000,
            // Half a core per sandbox.
            cpu_quota: 50_000,
            seccomp_profile: "/etc/kodewar/seccomp.json".to_string(),
            nofile: 256,
            nproc: 64,
            memlock_bytes: 65536,
        }
    }
}

impl SandboxDefaults {
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        if let Ok(path) = env::var("SECCOMP_PROFILE") {
            defaults.seccomp_profile = path;
        }
        defaults
    }

    /// Assemble the resource envelope for one submission. The address-space
    /// ulimit tracks the memory ceiling with headroom for interpreter
    /// virtual mappings.
    pub fn resource_config(&self, memory_limit_mb: u64) -> ResourceConfig {
        let memory_bytes = (memory_limit_mb as i64) * 1024 * 1024;

        ResourceConfig {
            memory_bytes,
            cpu_period: self.cpu_period,
            cpu_quota: self.cpu_quota,
            read_only_rootfs: true,
            network_disabled: true,
            security_opts: vec![
                "no-new-privileges".to_string(),
                format!("seccomp={}", self.seccomp_profile),
            ],
            ulimits: Ulimits {
                nofile: self.nofile,
                nproc: self.nproc,
                memlock: self.memlock_bytes,
                address_space: memory_bytes.saturating_mul(2),
            },
            tmpfs: HashMap::from([("/tmp".to_string(), "rw,noexec,nosuid,size=16m".to_string())]),
        }
    }
}
