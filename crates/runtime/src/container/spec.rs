//! Container specification and validation.

use std::collections::HashMap;
use std::time::Duration;

use sandcell_core::{Error, Result};

// =============================================================================
// Mounts
// =============================================================================

/// The type of a container mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    /// A host path mounted into the container.
    Bind,
    /// A named volume.
    Volume,
    /// An in-memory filesystem.
    Tmpfs,
}

/// A filesystem mount for a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    /// Mount type.
    pub mount_type: MountType,
    /// Host path (bind) or volume name (volume). Unused for tmpfs.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl Mount {
    fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(Error::invalid_spec("mount target is required"));
        }
        match self.mount_type {
            MountType::Bind if self.source.is_empty() => {
                Err(Error::invalid_spec("source is required for bind mounts"))
            }
            MountType::Volume if self.source.is_empty() => {
                Err(Error::invalid_spec("source is required for volume mounts"))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Resources and Security
// =============================================================================

/// Container resource limits. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Memory limit in bytes.
    pub memory_bytes: i64,
    /// CPU quota in microseconds per 100ms period.
    pub cpu_quota_micros: i64,
    /// Maximum number of processes.
    pub pids_limit: i64,
    /// Disk limit in bytes. Not all runtimes support this.
    pub disk_bytes: i64,
}

impl ResourceSpec {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("memory", self.memory_bytes),
            ("cpu quota", self.cpu_quota_micros),
            ("pids limit", self.pids_limit),
            ("disk limit", self.disk_bytes),
        ];
        for (name, value) in fields {
            if value < 0 {
                return Err(Error::invalid_spec(format!("{name} cannot be negative")));
            }
        }
        Ok(())
    }
}

/// Container security posture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecuritySpec {
    /// User to run as (e.g. `"nobody:nogroup"`).
    pub user: String,
    /// Mount the root filesystem read-only.
    pub read_only_rootfs: bool,
    /// Network mode: `"none"`, `"bridge"`. `"host"` never validates.
    pub network_mode: String,
    /// Path to a seccomp profile. Empty uses the runtime's default.
    pub seccomp_profile: String,
    /// Extended privileges. Never validates when `true`.
    pub privileged: bool,
}

impl SecuritySpec {
    fn validate(&self) -> Result<()> {
        if self.privileged {
            return Err(Error::security_violation(
                "privileged containers are not allowed",
            ));
        }
        if self.network_mode == "host" {
            return Err(Error::security_violation("host network is not allowed"));
        }
        Ok(())
    }
}

// =============================================================================
// Container Spec
// =============================================================================

/// What to run in a container and how.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    /// Image reference. Required.
    pub image: String,
    /// Command to execute.
    pub command: Vec<String>,
    /// Working directory inside the container.
    pub working_dir: String,
    /// Environment variables in `KEY=value` form.
    pub env: Vec<String>,
    /// Filesystem mounts.
    pub mounts: Vec<Mount>,
    /// Resource limits.
    pub resources: ResourceSpec,
    /// Security posture.
    pub security: SecuritySpec,
    /// Maximum execution duration.
    pub timeout: Duration,
    /// Labels for tracking.
    pub labels: HashMap<String, String>,
}

impl ContainerSpec {
    /// Check the spec for policy violations and invalid fields.
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(Error::invalid_spec("image is required"));
        }
        self.security.validate()?;
        self.resources.validate()?;
        for (i, mount) in self.mounts.iter().enumerate() {
            mount
                .validate()
                .map_err(|e| Error::wrap(format!("mount[{i}]"), e))?;
        }
        Ok(())
    }
}

/// Captured output of one container execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerOutcome {
    /// The container's exit code.
    pub exit_code: i64,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Execution time.
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandcell_core::ErrorKind;

    fn minimal() -> ContainerSpec {
        ContainerSpec {
            image: "alpine:latest".into(),
            ..Default::default()
        }
    }

    #[test]
    fn minimal_spec_validates() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn empty_image_is_invalid() {
        let err = ContainerSpec::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn privileged_is_a_security_violation() {
        let mut spec = minimal();
        spec.security.privileged = true;
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
    }

    #[test]
    fn host_network_is_a_security_violation() {
        let mut spec = minimal();
        spec.security.network_mode = "host".into();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SecurityViolation);
    }

    #[test]
    fn negative_resources_are_invalid() {
        let mut spec = minimal();
        spec.resources.memory_bytes = -1;
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    }

    #[test]
    fn bind_mounts_require_a_source() {
        let mut spec = minimal();
        spec.mounts.push(Mount {
            mount_type: MountType::Bind,
            source: String::new(),
            target: "/data".into(),
            read_only: true,
        });
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
        assert!(err.to_string().contains("mount[0]"));
    }

    #[test]
    fn tmpfs_mounts_need_no_source() {
        let mut spec = minimal();
        spec.mounts.push(Mount {
            mount_type: MountType::Tmpfs,
            source: String::new(),
            target: "/workspace".into(),
            read_only: false,
        });
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn mounts_require_a_target() {
        let mut spec = minimal();
        spec.mounts.push(Mount {
            mount_type: MountType::Tmpfs,
            source: String::new(),
            target: String::new(),
            read_only: false,
        });
        assert_eq!(spec.validate().unwrap_err().kind(), ErrorKind::InvalidSpec);
    }
}
