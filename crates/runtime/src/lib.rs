#![deny(unused)]
//! Profile-routing runtime and isolation backends.
//!
//! The [`RuntimeRouter`] selects an isolation backend per request by security
//! profile, enforces policy (unsafe-backend denial), delegates execution, and
//! harvests the tool call trace from the gateway. Two reference backends:
//!
//! - [`UnsafeHostBackend`] runs snippets directly on the host via a language
//!   toolchain subprocess. No isolation; development only, gated behind an
//!   explicit opt-in.
//! - [`container::ContainerBackend`] builds a validated container spec from
//!   the request and the profile's security posture and hands it to a
//!   pluggable [`container::ContainerRunner`] (Docker, containerd,
//!   Kubernetes, gVisor, Kata, Firecracker — one shape fits all of them). A
//!   Docker runner binding over `bollard` is included.
//!
//! [`OrchestratedBackend`] wraps any backend with workflow-style retry
//! orchestration; it adds no isolation of its own.

pub mod container;
pub mod envelope;
pub mod router;
pub mod temporal;
pub mod unsafe_host;

pub use container::{ContainerBackend, ContainerBackendConfig};
pub use envelope::SnippetLanguage;
pub use router::{RouterConfig, RuntimeRouter};
pub use temporal::{OrchestratedBackend, OrchestratorConfig};
pub use unsafe_host::{UnsafeHostBackend, UnsafeHostConfig};
