use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// =============================================================================
// Security Profiles
// =============================================================================

/// Security posture selected per request.
///
/// Higher profiles impose more restrictions but provide better isolation. The
/// profile selects a backend and a baseline resource/network stance; it does
/// not change runtime behavior directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProfile {
    /// Development mode with minimal restrictions.
    ///
    /// WARNING: may route to backends with host access. Development only.
    Dev,
    /// Standard isolation: no network, read-only rootfs, resource limits.
    Standard,
    /// Maximum isolation: standard restrictions plus syscall filtering.
    Hardened,
}

impl SecurityProfile {
    /// The snake_case string form used in labels and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProfile::Dev => "dev",
            SecurityProfile::Standard => "standard",
            SecurityProfile::Hardened => "hardened",
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(SecurityProfile::Dev),
            "standard" => Ok(SecurityProfile::Standard),
            "hardened" => Ok(SecurityProfile::Hardened),
            other => Err(Error::invalid_request(format!(
                "unknown security profile: {other:?}"
            ))),
        }
    }
}

// =============================================================================
// Backend Kinds
// =============================================================================

/// Identifies the isolation mechanism actually used for an execution.
///
/// Carried in [`BackendInfo`](crate::types::BackendInfo) on every result so
/// that callers can audit where a snippet ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Direct execution on the host. No isolation; development only.
    UnsafeHost,
    /// Docker containers: cgroups, read-only rootfs, seccomp.
    Docker,
    /// containerd directly; more infrastructure-native than Docker.
    Containerd,
    /// Short-lived Kubernetes pods/jobs; isolation depends on runtime class.
    Kubernetes,
    /// gVisor (runsc) user-space kernel for untrusted multi-tenant execution.
    #[serde(rename = "gvisor")]
    GVisor,
    /// Kata Containers for VM-level isolation.
    Kata,
    /// Firecracker microVMs; strongest isolation, highest operational cost.
    Firecracker,
    /// Code compiled to WebAssembly; strong in-process isolation.
    Wasm,
    /// Workflow orchestration over an inner sandbox backend.
    Temporal,
    /// A remote runtime service, batch system, or job runner.
    Remote,
}

impl BackendKind {
    /// The snake_case string form used in labels, records, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::UnsafeHost => "unsafe_host",
            BackendKind::Docker => "docker",
            BackendKind::Containerd => "containerd",
            BackendKind::Kubernetes => "kubernetes",
            BackendKind::GVisor => "gvisor",
            BackendKind::Kata => "kata",
            BackendKind::Firecracker => "firecracker",
            BackendKind::Wasm => "wasm",
            BackendKind::Temporal => "temporal",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
