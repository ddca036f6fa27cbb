//! Docker bindings for the container backend, via the `bollard` crate.
//!
//! [`BollardRunner`] implements the atomic create → start → wait → remove
//! lifecycle against a local Docker daemon. The container is force-removed on
//! every exit path, including cancellation and timeout.

use std::time::Instant;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount as DockerMount, MountTypeEnum};
use bollard::Docker;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sandcell_core::{Error, ErrorKind, Result};

use super::runner::{ContainerRunner, DaemonInfo, HealthChecker, ImageResolver};
use super::spec::{ContainerOutcome, ContainerSpec, MountType};

// =============================================================================
// Runner
// =============================================================================

/// [`ContainerRunner`] over the Docker API.
pub struct BollardRunner {
    docker: Docker,
}

impl BollardRunner {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            Error::daemon_unavailable("failed to connect to Docker daemon")
                .with_source(e)
                .with_op("connect")
        })?;
        Ok(Self { docker })
    }

    /// Use an existing client (for tests and custom transports).
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    async fn run_to_completion(&self, name: &str) -> Result<ContainerOutcome> {
        let start = Instant::now();

        self.docker
            .start_container::<String>(name, None)
            .await
            .map_err(|e| {
                Error::new(
                    ErrorKind::ContainerStart,
                    format!("failed to start container {name}"),
                )
                .with_source(e)
                .with_op("start")
            })?;

        // Drain logs while waiting for the exit code; the log stream ends
        // when the container stops.
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut logs = self.docker.logs(
            name,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );
        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    stderr.push_str(&format!("\n[log stream error: {e}]"));
                    break;
                }
            }
        }

        let mut wait = self
            .docker
            .wait_container(name, None::<WaitContainerOptions<String>>);
        let exit_code = match wait.next().await {
            Some(Ok(response)) => response.status_code,
            Some(Err(e)) => {
                return Err(Error::new(
                    ErrorKind::ContainerWait,
                    format!("failed waiting for container {name}"),
                )
                .with_source(e)
                .with_op("wait"));
            }
            None => -1,
        };

        Ok(ContainerOutcome {
            exit_code,
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }

    async fn remove(&self, name: &str) {
        let removed = self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
        if let Err(e) = removed {
            tracing::warn!(container = name, error = %e, "container removal failed");
        }
    }
}

#[async_trait]
impl ContainerRunner for BollardRunner {
    async fn run(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<ContainerOutcome> {
        spec.validate()?;
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        let name = format!("sandcell-{}", Uuid::new_v4());

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.as_str(),
                    platform: None,
                }),
                container_config(spec),
            )
            .await
            .map_err(|e| {
                Error::new(
                    ErrorKind::ContainerCreate,
                    format!("failed to create container from {}", spec.image),
                )
                .with_source(e)
                .with_op("create")
            })?;

        tracing::debug!(container = %name, image = %spec.image, "container created");

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::cancelled().with_op("wait")),
            res = async {
                if spec.timeout.is_zero() {
                    self.run_to_completion(&name).await
                } else {
                    match tokio::time::timeout(spec.timeout, self.run_to_completion(&name))
                        .await
                    {
                        Err(_) => Err(Error::timeout(format!(
                            "container exceeded {}ms",
                            spec.timeout.as_millis()
                        ))),
                        Ok(res) => res,
                    }
                }
            } => res,
        };

        // Removal happens on every exit path.
        self.remove(&name).await;

        outcome
    }
}

// =============================================================================
// Health checker and image resolver
// =============================================================================

/// [`HealthChecker`] over the Docker API.
pub struct BollardHealth {
    docker: Docker,
}

impl BollardHealth {
    /// Wrap an existing client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl HealthChecker for BollardHealth {
    async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        self.docker.ping().await.map_err(|e| {
            Error::daemon_unavailable("docker daemon unreachable")
                .with_source(e)
                .with_op("ping")
        })?;
        Ok(())
    }

    async fn info(&self, cancel: &CancellationToken) -> Result<DaemonInfo> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        let version = self.docker.version().await.map_err(|e| {
            Error::daemon_unavailable("failed to read daemon version")
                .with_source(e)
                .with_op("version")
        })?;
        Ok(DaemonInfo {
            version: version.version.unwrap_or_default(),
            api_version: version.api_version.unwrap_or_default(),
            os: version.os.unwrap_or_default(),
            architecture: version.arch.unwrap_or_default(),
        })
    }
}

/// [`ImageResolver`] that pulls the image when it is missing locally.
pub struct BollardImageResolver {
    docker: Docker,
}

impl BollardImageResolver {
    /// Wrap an existing client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ImageResolver for BollardImageResolver {
    async fn resolve(&self, cancel: &CancellationToken, image: &str) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }

        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(image.to_string());
        }

        tracing::info!(image, "pulling execution image");
        let mut pull = self.docker.create_image(
            Some(CreateImageOptions::<String> {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );
        loop {
            let progress = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::cancelled().with_op("pull")),
                progress = pull.next() => progress,
            };
            match progress {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(Error::new(ErrorKind::ImagePull, "image pull failed")
                        .with_source(e)
                        .with_op("pull"));
                }
                None => break,
            }
        }
        Ok(image.to_string())
    }
}

// =============================================================================
// Spec conversion
// =============================================================================

fn container_config(spec: &ContainerSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        working_dir: (!spec.working_dir.is_empty()).then(|| spec.working_dir.clone()),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        user: (!spec.security.user.is_empty()).then(|| spec.security.user.clone()),
        labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
        host_config: Some(host_config(spec)),
        ..Default::default()
    }
}

fn host_config(spec: &ContainerSpec) -> HostConfig {
    let mut security_opt = vec!["no-new-privileges:true".to_string()];
    if !spec.security.seccomp_profile.is_empty() {
        security_opt.push(format!("seccomp={}", spec.security.seccomp_profile));
    }

    HostConfig {
        memory: (spec.resources.memory_bytes > 0).then_some(spec.resources.memory_bytes),
        cpu_quota: (spec.resources.cpu_quota_micros > 0).then_some(spec.resources.cpu_quota_micros),
        cpu_period: (spec.resources.cpu_quota_micros > 0).then_some(100_000),
        pids_limit: (spec.resources.pids_limit > 0).then_some(spec.resources.pids_limit),
        network_mode: (!spec.security.network_mode.is_empty())
            .then(|| spec.security.network_mode.clone()),
        readonly_rootfs: Some(spec.security.read_only_rootfs),
        cap_drop: Some(vec!["ALL".to_string()]),
        security_opt: Some(security_opt),
        mounts: (!spec.mounts.is_empty()).then(|| spec.mounts.iter().map(docker_mount).collect()),
        ..Default::default()
    }
}

fn docker_mount(mount: &super::spec::Mount) -> DockerMount {
    DockerMount {
        target: Some(mount.target.clone()),
        source: (!mount.source.is_empty()).then(|| mount.source.clone()),
        typ: Some(match mount.mount_type {
            MountType::Bind => MountTypeEnum::BIND,
            MountType::Volume => MountTypeEnum::VOLUME,
            MountType::Tmpfs => MountTypeEnum::TMPFS,
        }),
        read_only: Some(mount.read_only),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::SpecBuilder;
    use super::*;
    use std::time::Duration;

    fn spec() -> ContainerSpec {
        SpecBuilder::new("alpine:latest")
            .with_command(["python3", "-c", "print(1)"])
            .with_working_dir("/workspace")
            .with_tmpfs("/workspace")
            .with_user("nobody:nogroup")
            .with_no_network()
            .with_read_only_rootfs(true)
            .with_seccomp_profile("/etc/sandcell/seccomp.json")
            .with_memory(64 * 1024 * 1024)
            .with_cpu(50_000)
            .with_pids_limit(32)
            .with_timeout(Duration::from_secs(10))
            .with_label("sandcell.profile", "hardened")
            .build()
            .unwrap()
    }

    #[test]
    fn host_config_carries_the_security_posture() {
        let hc = host_config(&spec());

        assert_eq!(hc.readonly_rootfs, Some(true));
        assert_eq!(hc.network_mode.as_deref(), Some("none"));
        assert_eq!(hc.cap_drop, Some(vec!["ALL".to_string()]));
        let opts = hc.security_opt.unwrap();
        assert!(opts.contains(&"no-new-privileges:true".to_string()));
        assert!(opts.contains(&"seccomp=/etc/sandcell/seccomp.json".to_string()));
    }

    #[test]
    fn host_config_carries_the_resource_caps() {
        let hc = host_config(&spec());

        assert_eq!(hc.memory, Some(64 * 1024 * 1024));
        assert_eq!(hc.cpu_quota, Some(50_000));
        assert_eq!(hc.cpu_period, Some(100_000));
        assert_eq!(hc.pids_limit, Some(32));
    }

    #[test]
    fn tmpfs_mount_converts() {
        let hc = host_config(&spec());
        let mounts = hc.mounts.unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].typ, Some(MountTypeEnum::TMPFS));
        assert_eq!(mounts[0].target.as_deref(), Some("/workspace"));
        assert_eq!(mounts[0].source, None);
    }

    #[test]
    fn container_config_carries_identity_and_command() {
        let cfg = container_config(&spec());
        assert_eq!(cfg.image.as_deref(), Some("alpine:latest"));
        assert_eq!(cfg.user.as_deref(), Some("nobody:nogroup"));
        assert_eq!(cfg.working_dir.as_deref(), Some("/workspace"));
        assert_eq!(cfg.cmd.as_ref().map(Vec::len), Some(3));
        assert!(cfg.labels.unwrap().contains_key("sandcell.profile"));
    }

    #[test]
    fn zero_caps_are_omitted() {
        let spec = SpecBuilder::new("alpine:latest").build().unwrap();
        let hc = host_config(&spec);
        assert_eq!(hc.memory, None);
        assert_eq!(hc.cpu_quota, None);
        assert_eq!(hc.pids_limit, None);
        assert_eq!(hc.network_mode, None);
    }
}
