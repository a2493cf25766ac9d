//! Sandbox abstraction for running untrusted code.
//!
//! The orchestrator drives executions through the [`Sandbox`] trait so its
//! transition logic can be tested without a Docker daemon. The real
//! implementation lives in [`crate::docker`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ExecError;

/// Process limits applied inside the container.
#[derive(Debug, Clone)]
pub struct Ulimits {
    pub nofile: i64,
    pub nproc: i64,
    pub memlock: i64,
    pub address_space: i64,
}

/// The full resource envelope for one sandboxed execution. Built per
/// submission and validated before any container exists, so a bad envelope
/// never costs a container create.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub memory_bytes: i64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub read_only_rootfs: bool,
    pub network_disabled: bool,
    /// Must carry a `seccomp=` syscall allow-list entry.
    pub security_opts: Vec<String>,
    pub ulimits: Ulimits,
    /// Writable scratch mounts layered over the read-only root.
    pub tmpfs: HashMap<String, String>,
}

impl ResourceConfig {
    /// Reject incomplete or unsafe envelopes. Every error names the knob
    /// that failed so operators can fix deployment config directly.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.memory_bytes <= 0 {
            return Err(ExecError::configuration("memory ceiling must be positive"));
        }
        if self.cpu_period <= 0 || self.cpu_quota <= 0 {
            return Err(ExecError::configuration(
                "cpu quota must be a positive period/quota pair",
            ));
        }
        if !self.read_only_rootfs {
            return Err(ExecError::configuration(
                "root filesystem must be read-only",
            ));
        }
        if !self.network_disabled {
            return Err(ExecError::configuration("network must be disabled"));
        }
        if !self.security_opts.iter().any(|opt| opt.starts_with("seccomp=")) {
            return Err(ExecError::configuration(
                "a seccomp syscall allow-list is required",
            ));
        }
        if self.ulimits.nofile <= 0 {
            return Err(ExecError::configuration("ulimit nofile must be positive"));
        }
        if self.ulimits.nproc <= 0 {
            return Err(ExecError::configuration("ulimit nproc must be positive"));
        }
        if self.ulimits.memlock <= 0 {
            return Err(ExecError::configuration("ulimit memlock must be positive"));
        }
        if self.ulimits.address_space <= 0 {
            return Err(ExecError::configuration(
                "ulimit address space must be positive",
            ));
        }
        Ok(())
    }
}

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub resources: ResourceConfig,
}

/// Opaque reference to a created container, valid until cleanup.
#[derive(Debug, Clone)]
pub struct SandboxHandle {
    pub container_id: String,
}

/// What a finished execution produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub exit_code: i64,
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
    /// Set when the output hit the capture cap and was cut off.
    pub truncated: bool,
}

/// One isolated execution environment per submission attempt.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Validate the resource envelope and create a container for it.
    async fn create(&self, request: &SandboxRequest) -> Result<SandboxHandle, ExecError>;

    /// Start the container and wait for it to finish, killing it if it
    /// outlives `timeout`.
    async fn run(&self, handle: &SandboxHandle, timeout: Duration) -> Result<RunOutput, ExecError>;

    /// Tear the container down. Infallible and safe to call on containers
    /// that are already gone; failures are logged, never raised.
    async fn cleanup(&self, handle: &SandboxHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hardened_config() -> ResourceConfig {
        ResourceConfig {
            memory_bytes: 512 * 1024 * 1024,
            cpu_period: 100_000,
            cpu_quota: 50_000,
            read_only_rootfs: true,
            network_disabled: true,
            security_opts: vec![
                "no-new-privileges".to_string(),
                "seccomp=/etc/kodewar/seccomp.json".to_string(),
            ],
            ulimits: Ulimits {
                nofile: 256,
                nproc: 64,
                memlock: 65536,
                address_space: 1024 * 1024 * 1024,
            },
            tmpfs: HashMap::from([("/tmp".to_string(), "rw,noexec,nosuid,size=16m".to_string())]),
        }
    }

    fn validation_message(config: &ResourceConfig) -> String {
        config.validate().unwrap_err().to_string()
    }

    #[test]
    fn test_hardened_config_passes() {
        assert!(hardened_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_memory_ceiling() {
        let mut config = hardened_config();
        config.memory_bytes = 0;
        assert!(validation_message(&config).contains("memory ceiling"));
    }

    #[test]
    fn test_rejects_missing_cpu_quota() {
        let mut config = hardened_config();
        config.cpu_quota = 0;
        assert!(validation_message(&config).contains("cpu quota"));

        let mut config = hardened_config();
        config.cpu_period = -1;
        assert!(validation_message(&config).contains("cpu quota"));
    }

    #[test]
    fn test_rejects_writable_rootfs() {
        let mut config = hardened_config();
        config.read_only_rootfs = false;
        assert!(validation_message(&config).contains("read-only"));
    }

    #[test]
    fn test_rejects_enabled_network() {
        let mut config = hardened_config();
        config.network_disabled = false;
        assert!(validation_message(&config).contains("network"));
    }

    #[test]
    fn test_rejects_missing_seccomp_allow_list() {
        let mut config = hardened_config();
        config.security_opts = vec!["no-new-privileges".to_string()];
        assert!(validation_message(&config).contains("seccomp"));

        config.security_opts.clear();
        assert!(validation_message(&config).contains("seccomp"));
    }

    #[test]
    fn test_rejects_nonpositive_ulimits() {
        let mut config = hardened_config();
        config.ulimits.nofile = 0;
        assert!(validation_message(&config).contains("nofile"));

        let mut config = hardened_config();
        config.ulimits.nproc = 0;
        assert!(validation_message(&config).contains("nproc"));

        let mut config = hardened_config();
        config.ulimits.memlock = -5;
        assert!(validation_message(&config).contains("memlock"));

        let mut config = hardened_config();
        config.ulimits.address_space = 0;
        assert!(validation_message(&config).contains("address space"));
    }

    #[test]
    fn test_validation_errors_are_configuration_kind() {
        let mut config = hardened_config();
        config.memory_bytes = -1;
        let err = config.validate().unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, ExecError::Configuration { .. }));
    }
}
