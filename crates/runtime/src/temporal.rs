//! Workflow-style orchestration over an inner sandbox backend.
//!
//! Orchestration is not isolation: this backend never runs a snippet itself.
//! It decorates an inner backend with a generated execution id and bounded
//! retries of retryable failures, the way a workflow engine would drive a
//! long-running or resumable execution.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sandcell_core::{
    Backend, BackendInfo, BackendKind, Error, ExecuteRequest, ExecuteResult, Result,
};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an [`OrchestratedBackend`].
pub struct OrchestratorConfig {
    /// Task queue name stamped into backend details.
    pub task_queue: String,
    /// Prefix for generated execution ids.
    pub execution_id_prefix: String,
    /// Maximum retries of retryable failures.
    pub max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_queue: "sandcell-execution".into(),
            execution_id_prefix: "sandcell-".into(),
            max_retries: 3,
        }
    }
}

// =============================================================================
// Orchestrated Backend
// =============================================================================

/// Decorator that adds workflow orchestration to an inner sandbox backend.
///
/// The inner backend is required at construction: the decorator has no
/// isolation of its own and must compose with one that does.
pub struct OrchestratedBackend {
    inner: Arc<dyn Backend>,
    task_queue: String,
    execution_id_prefix: String,
    max_retries: u32,
}

impl OrchestratedBackend {
    /// Wrap an inner sandbox backend.
    pub fn new(inner: Arc<dyn Backend>, cfg: OrchestratorConfig) -> Self {
        Self {
            inner,
            task_queue: cfg.task_queue,
            execution_id_prefix: cfg.execution_id_prefix,
            max_retries: cfg.max_retries,
        }
    }
}

#[async_trait]
impl Backend for OrchestratedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Temporal
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled().with_backend(BackendKind::Temporal));
        }
        req.validate()?;

        let execution_id = format!("{}{}", self.execution_id_prefix, uuid::Uuid::new_v4());

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.inner.execute(cancel, req.clone()).await {
                Ok(mut result) => {
                    result.backend = BackendInfo::new(BackendKind::Temporal)
                        .with_detail("execution_id", execution_id.as_str())
                        .with_detail("task_queue", self.task_queue.as_str())
                        .with_detail("sandbox_backend", self.inner.kind().as_str())
                        .with_detail("attempts", attempt);
                    return Ok(result);
                }
                Err(err) if err.retryable() && attempt <= self.max_retries => {
                    tracing::warn!(
                        execution_id = %execution_id,
                        attempt,
                        error = %err,
                        "retryable execution failure, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sandcell_core::mocks::{MockBackend, MockGateway};
    use sandcell_core::{ErrorKind, ToolGateway};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> ExecuteRequest {
        let gateway: Arc<dyn ToolGateway> = Arc::new(MockGateway::new());
        ExecuteRequest {
            code: "__out = 1".into(),
            gateway: Some(gateway),
            ..Default::default()
        }
    }

    /// Fails with a retryable error until `succeed_after` attempts.
    struct FlakyBackend {
        attempts: AtomicUsize,
        succeed_after: usize,
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Docker
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            req: ExecuteRequest,
        ) -> Result<ExecuteResult> {
            req.validate()?;
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < self.succeed_after {
                return Err(Error::daemon_unavailable("transient"));
            }
            Ok(ExecuteResult::for_backend(BackendInfo::new(
                BackendKind::Docker,
            )))
        }
    }

    #[tokio::test]
    async fn stamps_orchestration_identity() {
        let inner = Arc::new(MockBackend::new(BackendKind::Docker));
        let backend = OrchestratedBackend::new(inner, OrchestratorConfig::default());
        let cancel = CancellationToken::new();

        let result = backend.execute(&cancel, request()).await.unwrap();
        assert_eq!(result.backend.kind, BackendKind::Temporal);
        assert_eq!(result.backend.details["sandbox_backend"], "docker");
        assert!(result.backend.details["execution_id"]
            .as_str()
            .unwrap()
            .starts_with("sandcell-"));
    }

    #[tokio::test]
    async fn retries_retryable_failures() {
        let inner = Arc::new(FlakyBackend {
            attempts: AtomicUsize::new(0),
            succeed_after: 3,
        });
        let backend = OrchestratedBackend::new(inner.clone(), OrchestratorConfig::default());
        let cancel = CancellationToken::new();

        let result = backend.execute(&cancel, request()).await.unwrap();
        assert_eq!(result.backend.details["attempts"], 3);
        assert_eq!(inner.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let inner = Arc::new(FlakyBackend {
            attempts: AtomicUsize::new(0),
            succeed_after: usize::MAX,
        });
        let backend = OrchestratedBackend::new(
            inner.clone(),
            OrchestratorConfig {
                max_retries: 2,
                ..Default::default()
            },
        );
        let cancel = CancellationToken::new();

        let err = backend.execute(&cancel, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DaemonUnavailable);
        assert_eq!(inner.attempts.load(Ordering::SeqCst), 3, "initial + 2 retries");
    }

    #[tokio::test]
    async fn never_retries_non_retryable_failures() {
        let inner = Arc::new(MockBackend::new(BackendKind::Docker).failing_with(ErrorKind::SandboxViolation));
        let backend = OrchestratedBackend::new(inner.clone(), OrchestratorConfig::default());
        let cancel = CancellationToken::new();

        let err = backend.execute(&cancel, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SandboxViolation);
        assert_eq!(inner.executions(), 1);
    }
}
