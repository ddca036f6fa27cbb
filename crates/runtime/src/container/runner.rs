//! Pluggable container lifecycle collaborators.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sandcell_core::Result;

use super::spec::{ContainerOutcome, ContainerSpec};

/// Performs the atomic container lifecycle for one execution.
///
/// Implementations may use the Docker API, containerd, a Kubernetes job, or
/// a mock. They must:
/// - Validate the spec before execution.
/// - Respect the cancellation handle and `spec.timeout`.
/// - Capture stdout and stderr and return the exit code.
/// - Remove the container on every exit path, success or failure.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    /// Run the spec through create → start → wait → remove.
    async fn run(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<ContainerOutcome>;
}

/// Resolves and pre-pulls images before execution.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Ensure the image is available, returning the resolved reference
    /// (possibly digest-pinned). Pulls when missing locally.
    async fn resolve(&self, cancel: &CancellationToken, image: &str) -> Result<String>;
}

/// Verifies daemon / control plane availability.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Check that the daemon is responsive.
    async fn ping(&self, cancel: &CancellationToken) -> Result<()>;

    /// Daemon metadata for diagnostics.
    async fn info(&self, cancel: &CancellationToken) -> Result<DaemonInfo>;
}

/// Container daemon metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DaemonInfo {
    /// Daemon version.
    pub version: String,
    /// API version.
    pub api_version: String,
    /// Daemon operating system.
    pub os: String,
    /// Daemon CPU architecture.
    pub architecture: String,
}

// =============================================================================
// Mock runner (for testing without a daemon)
// =============================================================================

/// In-memory [`ContainerRunner`] for unit testing.
///
/// Records every spec it receives and replays scripted outcomes. An empty
/// script yields a zero-exit outcome echoing the spec's command.
#[derive(Default)]
pub struct MockContainerRunner {
    outcomes: std::sync::Mutex<Vec<Result<ContainerOutcome>>>,
    specs: std::sync::Mutex<Vec<ContainerSpec>>,
}

impl MockContainerRunner {
    /// A runner where every execution succeeds with exit code 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome (or error) for the next run.
    pub fn push_outcome(&self, outcome: Result<ContainerOutcome>) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    /// Specs received so far, in order.
    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRunner for MockContainerRunner {
    async fn run(
        &self,
        cancel: &CancellationToken,
        spec: &ContainerSpec,
    ) -> Result<ContainerOutcome> {
        if cancel.is_cancelled() {
            return Err(sandcell_core::Error::cancelled());
        }
        spec.validate()?;
        self.specs.lock().unwrap().push(spec.clone());
        match self.outcomes.lock().unwrap().pop() {
            Some(outcome) => outcome,
            None => Ok(ContainerOutcome {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration: std::time::Duration::from_millis(5),
            }),
        }
    }
}
