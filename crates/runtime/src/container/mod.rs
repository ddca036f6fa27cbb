//! Container-spec backend.
//!
//! One shape serves every container-ish isolation mechanism (Docker,
//! containerd, Kubernetes, gVisor, Kata, Firecracker): the backend builds a
//! validated [`ContainerSpec`] from the request and the profile's security
//! posture, then hands it to a pluggable [`ContainerRunner`] that performs
//! the atomic create → start → wait → remove lifecycle.

mod backend;
mod bollard_runner;
mod builder;
mod runner;
mod spec;

pub use backend::{ContainerBackend, ContainerBackendConfig, LABEL_BACKEND, LABEL_PROFILE};
pub use bollard_runner::{BollardHealth, BollardImageResolver, BollardRunner};
pub use builder::SpecBuilder;
pub use runner::{ContainerRunner, DaemonInfo, HealthChecker, ImageResolver, MockContainerRunner};
pub use spec::{ContainerOutcome, ContainerSpec, Mount, MountType, ResourceSpec, SecuritySpec};
