//! Docker-backed [`Sandbox`] implementation.
//!
//! **Execution rules:**
//! 1. Validates the resource envelope before touching the daemon
//! 2. Pulls the language image if missing
//! 3. Creates the container with hardening applied:
//!    - Network disabled
//!    - CPU/memory limits and process ulimits enforced
//!    - Read-only root filesystem with a tmpfs scratch mount
//!    - All capabilities dropped, seccomp allow-list active
//! 4. Waits for exit with a hard deadline, force-killing on overrun
//! 5. Captures combined stdout/stderr up to a fixed cap
//! 6. Removal is idempotent: an already-gone container counts as removed

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, ResourcesUlimits};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExecError;
use crate::sandbox::{ResourceConfig, RunOutput, Sandbox, SandboxHandle, SandboxRequest};

/// Cap on captured container output.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024; // 1MB

/// Extra time allowed for a force-killed container to actually die before
/// the wait is abandoned.
const KILL_GRACE: Duration = Duration::from_secs(5);

pub struct DockerSandbox {
    docker: Docker,
}

impl DockerSandbox {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub fn connect() -> Result<Self, ExecError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            ExecError::infrastructure(format!("failed to connect to Docker daemon: {}", e))
        })?;
        Ok(Self::new(docker))
    }

    /// Verify the image exists locally, pulling it if not.
    async fn ensure_image(&self, image: &str) -> Result<(), ExecError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                debug!("image cache hit: {}", image);
                return Ok(());
            }
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => {
                return Err(ExecError::infrastructure(format!(
                    "failed to inspect image '{}': {}",
                    image, e
                )))
            }
        }

        warn!("image cache miss: {} (pulling now)", image);

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                ExecError::infrastructure(format!("failed to pull image '{}': {}", image, e))
            })?;
        }

        info!("image pulled: {}", image);
        Ok(())
    }

    fn host_config(resources: &ResourceConfig) -> HostConfig {
        let ulimit = |name: &str, value: i64| ResourcesUlimits {
            name: Some(name.to_string()),
            soft: Some(value),
            hard: Some(value),
        };

        HostConfig {
            memory: Some(resources.memory_bytes),
            cpu_period: Some(resources.cpu_period),
            cpu_quota: Some(resources.cpu_quota),
            readonly_rootfs: Some(resources.read_only_rootfs),
            security_opt: Some(resources.security_opts.clone()),
            cap_drop: Some(vec!["ALL".to_string()]),
            ulimits: Some(vec![
                ulimit("nofile", resources.ulimits.nofile),
                ulimit("nproc", resources.ulimits.nproc),
                ulimit("memlock", resources.ulimits.memlock),
                ulimit("as", resources.ulimits.address_space),
            ]),
            tmpfs: Some(resources.tmpfs.clone()),
            ..Default::default()
        }
    }

    /// Map well-known kill signals to their failure class.
    /// 137 is SIGKILL from the OOM killer; 159 is SIGSYS from seccomp.
    fn classify_exit(exit_code: i64) -> Option<ExecError> {
        match exit_code {
            137 => Some(ExecError::resource_limit(
                "memory limit reached (container killed, exit code 137)",
            )),
            159 => Some(ExecError::security(
                "syscall outside the seccomp allow-list (SIGSYS, exit code 159)",
            )),
            _ => None,
        }
    }

    /// Read combined stdout/stderr in arrival order, stopping at the cap.
    async fn collect_output(&self, container_id: &str) -> Result<(String, bool), ExecError> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        });

        let mut stream = self.docker.logs(container_id, options);
        let mut combined: Vec<u8> = Vec::new();
        let mut truncated = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ExecError::infrastructure(format!("failed to read container logs: {}", e))
            })?;
            let bytes = match chunk {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => message,
                LogOutput::StdIn { .. } => continue,
            };
            if append_capped(&mut combined, &bytes, MAX_OUTPUT_BYTES) {
                truncated = true;
                break;
            }
        }

        Ok((String::from_utf8_lossy(&combined).into_owned(), truncated))
    }
}

/// Append `chunk` to `buf` without letting it grow past `cap`.
/// Returns true when the chunk had to be cut off.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let remaining = cap.saturating_sub(buf.len());
    if chunk.len() > remaining {
        buf.extend_from_slice(&chunk[..remaining]);
        true
    } else {
        buf.extend_from_slice(chunk);
        false
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn create(&self, request: &SandboxRequest) -> Result<SandboxHandle, ExecError> {
        // A bad envelope must never cost a container create.
        request.resources.validate()?;

        self.ensure_image(&request.image).await?;

        let container_name = format!("kodewar-{}", uuid::Uuid::new_v4());

        let config = Config {
            image: Some(request.image.clone()),
            cmd: Some(request.command.clone()),
            env: Some(request.env.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(request.resources.network_disabled),
            host_config: Some(Self::host_config(&request.resources)),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| {
                ExecError::infrastructure(format!("failed to create container: {}", e))
            })?;

        debug!(container_id = %container.id, image = %request.image, "created sandbox container");

        Ok(SandboxHandle {
            container_id: container.id,
        })
    }

    async fn run(&self, handle: &SandboxHandle, timeout: Duration) -> Result<RunOutput, ExecError> {
        let container_id = handle.container_id.as_str();

        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ExecError::infrastructure(format!("failed to start container: {}", e)))?;

        let wait_options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut wait_stream = self.docker.wait_container(container_id, Some(wait_options));

        let exit_code = match tokio::time::timeout(timeout, wait_stream.next()).await {
            Ok(Some(Ok(response))) => response.status_code,
            // Non-zero exits surface as a wait "error" carrying the code.
            Ok(Some(Err(DockerError::DockerContainerWaitError { code, .. }))) => code,
            Ok(Some(Err(e))) => {
                return Err(ExecError::infrastructure(format!(
                    "failed waiting for container: {}",
                    e
                )))
            }
            Ok(None) => {
                return Err(ExecError::infrastructure(
                    "container wait stream ended without a status",
                ))
            }
            Err(_) => {
                warn!(
                    container_id = %container_id,
                    timeout_secs = timeout.as_secs(),
                    "execution deadline exceeded, killing container"
                );
                if let Err(e) = self
                    .docker
                    .kill_container(container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = %container_id, error = %e, "failed to kill timed-out container");
                }
                // Absorb teardown latency so the container is really dead
                // before cleanup runs.
                let _ = tokio::time::timeout(KILL_GRACE, wait_stream.next()).await;
                return Err(ExecError::resource_limit(format!(
                    "execution exceeded the {}s time limit",
                    timeout.as_secs()
                )));
            }
        };

        debug!(container_id = %container_id, exit_code, "container exited");

        if let Some(err) = Self::classify_exit(exit_code) {
            return Err(err);
        }

        let (output, truncated) = self.collect_output(container_id).await?;
        if truncated {
            warn!(container_id = %container_id, cap_bytes = MAX_OUTPUT_BYTES, "container output truncated");
        }

        Ok(RunOutput {
            exit_code,
            output,
            truncated,
        })
    }

    async fn cleanup(&self, handle: &SandboxHandle) {
        let remove_options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });

        match self
            .docker
            .remove_container(&handle.container_id, remove_options)
            .await
        {
            Ok(()) => {
                debug!(container_id = %handle.container_id, "removed sandbox container");
            }
            // Already gone counts as removed.
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(container_id = %handle.container_id, "container already removed");
            }
            Err(e) => {
                warn!(container_id = %handle.container_id, error = %e, "failed to remove sandbox container");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Ulimits;
    use std::collections::HashMap;

    #[test]
    fn test_classify_oom_kill() {
        let err = DockerSandbox::classify_exit(137).unwrap();
        assert!(matches!(err, ExecError::ResourceLimit { .. }));
        assert!(err.to_string().contains("memory limit"));
    }

    #[test]
    fn test_classify_seccomp_kill() {
        let err = DockerSandbox::classify_exit(159).unwrap();
        assert!(err.is_security());
        assert!(err.to_string().contains("seccomp"));
    }

    #[test]
    fn test_ordinary_exit_codes_are_not_classified() {
        assert!(DockerSandbox::classify_exit(0).is_none());
        assert!(DockerSandbox::classify_exit(1).is_none());
        assert!(DockerSandbox::classify_exit(2).is_none());
    }

    #[test]
    fn test_append_capped_passes_small_chunks_through() {
        let mut buf = Vec::new();
        assert!(!append_capped(&mut buf, b"hello\n", 1024));
        assert!(!append_capped(&mut buf, b"world\n", 1024));
        assert_eq!(buf, b"hello\nworld\n");
    }

    #[test]
    fn test_append_capped_cuts_at_the_cap() {
        let mut buf = Vec::new();
        assert!(!append_capped(&mut buf, b"123456", 8));
        assert!(append_capped(&mut buf, b"789abc", 8));
        assert_eq!(buf, b"12345678");
    }

    #[test]
    fn test_append_capped_full_buffer_rejects_everything() {
        let mut buf = vec![0u8; 4];
        assert!(append_capped(&mut buf, b"x", 4));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_host_config_applies_hardening() {
        let resources = ResourceConfig {
            memory_bytes: 256 * 1024 * 1024,
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
                address_space: 512 * 1024 * 1024,
            },
            tmpfs: HashMap::from([("/tmp".to_string(), "rw,noexec,nosuid,size=16m".to_string())]),
        };

        let host_config = DockerSandbox::host_config(&resources);

        assert_eq!(host_config.memory, Some(256 * 1024 * 1024));
        assert_eq!(host_config.cpu_period, Some(100_000));
        assert_eq!(host_config.cpu_quota, Some(50_000));
        assert_eq!(host_config.readonly_rootfs, Some(true));
        assert_eq!(host_config.cap_drop, Some(vec!["ALL".to_string()]));

        let ulimits = host_config.ulimits.unwrap();
        assert_eq!(ulimits.len(), 4);
        let names: Vec<_> = ulimits.iter().filter_map(|u| u.name.clone()).collect();
        assert_eq!(names, vec!["nofile", "nproc", "memlock", "as"]);
        // Soft and hard match, nothing is raisable from inside.
        for ulimit in &ulimits {
            assert_eq!(ulimit.soft, ulimit.hard);
        }

        let tmpfs = host_config.tmpfs.unwrap();
        assert!(tmpfs.contains_key("/tmp"));
    }
}
