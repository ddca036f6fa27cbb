//! Fluent builder for [`ContainerSpec`] with validation at build time.

use std::time::Duration;

use sandcell_core::Result;

use super::spec::{ContainerSpec, Mount, MountType, ResourceSpec, SecuritySpec};

/// Constructs a [`ContainerSpec`], validating on [`SpecBuilder::build`].
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    spec: ContainerSpec,
}

impl SpecBuilder {
    /// Start a spec for the given image.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            spec: ContainerSpec {
                image: image.into(),
                ..Default::default()
            },
        }
    }

    /// Set the command to execute.
    pub fn with_command(mut self, cmd: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.spec.command = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory inside the container.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.spec.working_dir = dir.into();
        self
    }

    /// Add one environment variable.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.push(format!("{key}={value}"));
        self
    }

    /// Append environment variables in `KEY=value` form.
    pub fn with_envs(mut self, envs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.spec.env.extend(envs.into_iter().map(Into::into));
        self
    }

    /// Add a mount.
    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.spec.mounts.push(mount);
        self
    }

    /// Add a bind mount from host to container.
    pub fn with_bind_mount(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        read_only: bool,
    ) -> Self {
        self.with_mount(Mount {
            mount_type: MountType::Bind,
            source: source.into(),
            target: target.into(),
            read_only,
        })
    }

    /// Add a tmpfs mount at the given target.
    pub fn with_tmpfs(self, target: impl Into<String>) -> Self {
        self.with_mount(Mount {
            mount_type: MountType::Tmpfs,
            source: String::new(),
            target: target.into(),
            read_only: false,
        })
    }

    /// Set the resource limits.
    pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
        self.spec.resources = resources;
        self
    }

    /// Set the memory limit in bytes.
    pub fn with_memory(mut self, bytes: i64) -> Self {
        self.spec.resources.memory_bytes = bytes;
        self
    }

    /// Set the CPU quota in microseconds per 100ms period.
    pub fn with_cpu(mut self, quota_micros: i64) -> Self {
        self.spec.resources.cpu_quota_micros = quota_micros;
        self
    }

    /// Set the maximum number of processes.
    pub fn with_pids_limit(mut self, limit: i64) -> Self {
        self.spec.resources.pids_limit = limit;
        self
    }

    /// Set the security posture.
    pub fn with_security(mut self, security: SecuritySpec) -> Self {
        self.spec.security = security;
        self
    }

    /// Set the user to run as.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.spec.security.user = user.into();
        self
    }

    /// Mount the root filesystem read-only.
    pub fn with_read_only_rootfs(mut self, read_only: bool) -> Self {
        self.spec.security.read_only_rootfs = read_only;
        self
    }

    /// Set the network mode.
    pub fn with_network_mode(mut self, mode: impl Into<String>) -> Self {
        self.spec.security.network_mode = mode.into();
        self
    }

    /// Disable network access.
    pub fn with_no_network(self) -> Self {
        self.with_network_mode("none")
    }

    /// Set the seccomp profile path.
    pub fn with_seccomp_profile(mut self, path: impl Into<String>) -> Self {
        self.spec.security.seccomp_profile = path.into();
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    /// Add one label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    /// Merge labels into the spec.
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = (String, String)>) -> Self {
        self.spec.labels.extend(labels);
        self
    }

    /// Validate and return the spec.
    pub fn build(self) -> Result<ContainerSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandcell_core::ErrorKind;

    #[test]
    fn builds_a_full_spec() {
        let spec = SpecBuilder::new("alpine:latest")
            .with_command(["python3", "-c", "print(1)"])
            .with_working_dir("/workspace")
            .with_env("LANG", "C.UTF-8")
            .with_tmpfs("/workspace")
            .with_memory(64 * 1024 * 1024)
            .with_cpu(50_000)
            .with_pids_limit(64)
            .with_user("nobody:nogroup")
            .with_read_only_rootfs(true)
            .with_no_network()
            .with_timeout(Duration::from_secs(30))
            .with_label("sandcell.profile", "standard")
            .build()
            .unwrap();

        assert_eq!(spec.image, "alpine:latest");
        assert_eq!(spec.command.len(), 3);
        assert_eq!(spec.security.network_mode, "none");
        assert!(spec.security.read_only_rootfs);
        assert_eq!(spec.resources.pids_limit, 64);
        assert_eq!(spec.labels["sandcell.profile"], "standard");
    }

    #[test]
    fn host_network_fails_at_build() {
        let err = SpecBuilder::new("alpine:latest")
            .with_network_mode("host")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
    }

    #[test]
    fn privileged_fails_at_build() {
        let err = SpecBuilder::new("alpine:latest")
            .with_security(SecuritySpec {
                privileged: true,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
    }

    #[test]
    fn missing_image_fails_at_build() {
        let err = SpecBuilder::new("").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn labels_merge() {
        let spec = SpecBuilder::new("alpine:latest")
            .with_label("a", "1")
            .with_labels([("b".to_string(), "2".to_string())])
            .build()
            .unwrap();
        assert_eq!(spec.labels.len(), 2);
    }
}
