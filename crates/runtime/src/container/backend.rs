//! The container-spec backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sandcell_core::sentinel;
use sandcell_core::{
    Backend, BackendInfo, BackendKind, Error, ExecuteRequest, ExecuteResult, Limits,
    LimitsEnforced, Result, SecurityProfile,
};

use crate::envelope::{wrap_snippet, SnippetLanguage};

use super::builder::SpecBuilder;
use super::runner::{ContainerRunner, HealthChecker, ImageResolver};
use super::spec::ContainerSpec;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const WORKSPACE: &str = "/workspace";

/// Label key carrying the effective security profile.
pub const LABEL_PROFILE: &str = "sandcell.profile";
/// Label key carrying the backend kind.
pub const LABEL_BACKEND: &str = "sandcell.backend";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`ContainerBackend`].
pub struct ContainerBackendConfig {
    /// The kind this backend reports. Defaults to [`BackendKind::Docker`];
    /// operators running the same shape over containerd, Kubernetes, gVisor,
    /// Kata, or Firecracker set the matching kind.
    pub kind: BackendKind,
    /// Image for snippet execution.
    pub image: String,
    /// Seccomp profile path applied under the hardened profile.
    pub seccomp_path: String,
    /// Default snippet language when the request carries no tag.
    pub language: SnippetLanguage,
    /// The lifecycle runner. Execution fails with `client-not-configured`
    /// when absent.
    pub runner: Option<Arc<dyn ContainerRunner>>,
    /// Optional image resolution / pre-pull.
    pub image_resolver: Option<Arc<dyn ImageResolver>>,
    /// Optional daemon health check before execution.
    pub health_checker: Option<Arc<dyn HealthChecker>>,
}

impl Default for ContainerBackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Docker,
            image: "sandcell-sandbox:latest".into(),
            seccomp_path: String::new(),
            language: SnippetLanguage::Python,
            runner: None,
            image_resolver: None,
            health_checker: None,
        }
    }
}

// =============================================================================
// Container Backend
// =============================================================================

/// Executes snippets in containers with a profile-derived security posture.
///
/// The backend owns spec construction and validation; the configured
/// [`ContainerRunner`] owns the container lifecycle and guarantees removal on
/// every exit path.
pub struct ContainerBackend {
    kind: BackendKind,
    image: String,
    seccomp_path: String,
    language: SnippetLanguage,
    runner: Option<Arc<dyn ContainerRunner>>,
    image_resolver: Option<Arc<dyn ImageResolver>>,
    health_checker: Option<Arc<dyn HealthChecker>>,
}

impl ContainerBackend {
    /// Create a container backend with the given configuration.
    pub fn new(cfg: ContainerBackendConfig) -> Self {
        Self {
            kind: cfg.kind,
            image: cfg.image,
            seccomp_path: cfg.seccomp_path,
            language: cfg.language,
            runner: cfg.runner,
            image_resolver: cfg.image_resolver,
            health_checker: cfg.health_checker,
        }
    }

    fn build_spec(
        &self,
        image: &str,
        req: &ExecuteRequest,
        profile: SecurityProfile,
        language: SnippetLanguage,
        timeout: Duration,
    ) -> Result<ContainerSpec> {
        let shell_flag = match language {
            SnippetLanguage::Python => "python3",
            SnippetLanguage::Shell => "/bin/sh",
        };
        let wrapped = wrap_snippet(language, &req.code);

        let mut builder = SpecBuilder::new(image)
            .with_command([shell_flag, "-c", wrapped.as_str()])
            .with_working_dir(WORKSPACE)
            .with_tmpfs(WORKSPACE)
            .with_user("nobody:nogroup")
            .with_timeout(timeout)
            .with_label(LABEL_PROFILE, profile.as_str())
            .with_label(LABEL_BACKEND, self.kind.as_str());

        builder = match profile {
            SecurityProfile::Dev => builder
                .with_network_mode("bridge")
                .with_read_only_rootfs(false),
            SecurityProfile::Standard => builder.with_no_network().with_read_only_rootfs(true),
            SecurityProfile::Hardened => {
                builder = builder.with_no_network().with_read_only_rootfs(true);
                if !self.seccomp_path.is_empty() {
                    builder = builder.with_seccomp_profile(&self.seccomp_path);
                }
                builder
            }
        };

        builder = apply_limits(builder, &req.limits);
        builder.build()
    }

    fn info(&self, image: &str, profile: SecurityProfile) -> BackendInfo {
        BackendInfo::new(self.kind)
            .with_detail("image", image)
            .with_detail("profile", profile.as_str())
    }
}

/// Apply the request's caps over the profile defaults. CPU is carried in
/// microseconds internally; the request's milliseconds are scaled.
fn apply_limits(mut builder: SpecBuilder, limits: &Limits) -> SpecBuilder {
    if limits.memory_bytes > 0 {
        builder = builder.with_memory(limits.memory_bytes);
    }
    if limits.cpu_quota_millis > 0 {
        builder = builder.with_cpu(limits.cpu_quota_millis * 1_000);
    }
    if limits.pids_max > 0 {
        builder = builder.with_pids_limit(limits.pids_max);
    }
    builder
}

#[async_trait]
impl Backend for ContainerBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled().with_backend(self.kind));
        }
        req.validate()?;

        let runner = match &self.runner {
            Some(runner) => Arc::clone(runner),
            None => {
                return Err(Error::client_not_configured("no container runner configured")
                    .with_backend(self.kind))
            }
        };

        let timeout = if req.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            req.timeout
        };

        if let Some(health) = &self.health_checker {
            if let Err(err) = health.ping(cancel).await {
                return Err(Error::daemon_unavailable("daemon ping failed")
                    .with_source(err)
                    .with_backend(self.kind)
                    .with_op("ping"));
            }
        }

        let image = match &self.image_resolver {
            Some(resolver) => resolver.resolve(cancel, &self.image).await?,
            None => self.image.clone(),
        };

        let profile = req.profile.unwrap_or(SecurityProfile::Standard);
        let language = SnippetLanguage::resolve(&req.language, self.language)?;
        let spec = self.build_spec(&image, &req, profile, language, timeout)?;

        tracing::info!(
            backend = %self.kind,
            profile = %profile,
            image = %image,
            network_mode = %spec.security.network_mode,
            read_only_rootfs = spec.security.read_only_rootfs,
            "executing in container"
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled().with_backend(self.kind).with_op("run"));
            }
            res = tokio::time::timeout(timeout, runner.run(cancel, &spec)) => match res {
                Err(_) => {
                    return Err(Error::timeout(format!(
                        "container execution exceeded {}ms",
                        timeout.as_millis()
                    ))
                    .with_backend(self.kind));
                }
                Ok(Err(err)) => {
                    return Err(Error::wrap("run", err).with_backend(self.kind));
                }
                Ok(Ok(outcome)) => outcome,
            },
        };

        let mut stderr = outcome.stderr;
        let value = if outcome.exit_code == 0 {
            sentinel::extract_value(&outcome.stdout)
        } else {
            if stderr.is_empty() {
                stderr = format!("snippet exited with status {}", outcome.exit_code);
            }
            None
        };

        Ok(ExecuteResult {
            value,
            stdout: outcome.stdout,
            stderr,
            tool_calls: Vec::new(),
            duration: outcome.duration,
            backend: self
                .info(&image, profile)
                .with_detail("exit_code", outcome.exit_code),
            limits_enforced: LimitsEnforced {
                timeout: true,
                tool_calls: true,
                chain_steps: true,
                memory: req.limits.memory_bytes > 0,
                cpu: req.limits.cpu_quota_millis > 0,
                pids: req.limits.pids_max > 0,
                // No container runtime here enforces a disk cap.
                disk: false,
            },
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::runner::{DaemonInfo, MockContainerRunner};
    use super::super::spec::{ContainerOutcome, MountType};
    use super::*;
    use sandcell_core::mocks::MockGateway;
    use sandcell_core::{ErrorKind, ToolGateway};
    use serde_json::json;

    struct FailingHealth;

    #[async_trait]
    impl HealthChecker for FailingHealth {
        async fn ping(&self, _cancel: &CancellationToken) -> Result<()> {
            Err(Error::daemon_unavailable("connection refused"))
        }

        async fn info(&self, _cancel: &CancellationToken) -> Result<DaemonInfo> {
            Err(Error::daemon_unavailable("connection refused"))
        }
    }

    struct PinningResolver;

    #[async_trait]
    impl ImageResolver for PinningResolver {
        async fn resolve(&self, _cancel: &CancellationToken, image: &str) -> Result<String> {
            Ok(format!("{image}@sha256:deadbeef"))
        }
    }

    fn backend_with(runner: Arc<MockContainerRunner>) -> ContainerBackend {
        ContainerBackend::new(ContainerBackendConfig {
            runner: Some(runner),
            seccomp_path: "/etc/sandcell/seccomp.json".into(),
            ..Default::default()
        })
    }

    fn request(profile: SecurityProfile) -> ExecuteRequest {
        let gateway: Arc<dyn ToolGateway> = Arc::new(MockGateway::new());
        ExecuteRequest {
            code: "__out = 7".into(),
            profile: Some(profile),
            gateway: Some(gateway),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_runner_is_client_not_configured() {
        let backend = ContainerBackend::new(ContainerBackendConfig::default());
        let cancel = CancellationToken::new();

        let err = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientNotConfigured);
    }

    #[tokio::test]
    async fn failing_health_check_is_daemon_unavailable() {
        let backend = ContainerBackend::new(ContainerBackendConfig {
            runner: Some(Arc::new(MockContainerRunner::new())),
            health_checker: Some(Arc::new(FailingHealth)),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let err = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DaemonUnavailable);
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn resolver_pins_the_image() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = ContainerBackend::new(ContainerBackendConfig {
            runner: Some(runner.clone()),
            image_resolver: Some(Arc::new(PinningResolver)),
            ..Default::default()
        });
        let cancel = CancellationToken::new();

        let result = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap();

        let specs = runner.specs();
        assert!(specs[0].image.ends_with("@sha256:deadbeef"));
        assert_eq!(
            result.backend.details["image"],
            json!("sandcell-sandbox:latest@sha256:deadbeef")
        );
    }

    #[tokio::test]
    async fn standard_profile_locks_the_container_down() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner.clone());
        let cancel = CancellationToken::new();

        backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap();

        let spec = &runner.specs()[0];
        assert_eq!(spec.security.network_mode, "none");
        assert!(spec.security.read_only_rootfs);
        assert_eq!(spec.security.user, "nobody:nogroup");
        assert!(spec.security.seccomp_profile.is_empty());
        assert_eq!(spec.working_dir, WORKSPACE);
        assert_eq!(spec.mounts[0].mount_type, MountType::Tmpfs);
        assert_eq!(spec.labels[LABEL_PROFILE], "standard");
        assert_eq!(spec.labels[LABEL_BACKEND], "docker");
    }

    #[tokio::test]
    async fn dev_profile_keeps_network_and_writable_rootfs() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner.clone());
        let cancel = CancellationToken::new();

        backend
            .execute(&cancel, request(SecurityProfile::Dev))
            .await
            .unwrap();

        let spec = &runner.specs()[0];
        assert_eq!(spec.security.network_mode, "bridge");
        assert!(!spec.security.read_only_rootfs);
    }

    #[tokio::test]
    async fn hardened_profile_adds_the_seccomp_filter() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner.clone());
        let cancel = CancellationToken::new();

        backend
            .execute(&cancel, request(SecurityProfile::Hardened))
            .await
            .unwrap();

        let spec = &runner.specs()[0];
        assert_eq!(spec.security.network_mode, "none");
        assert_eq!(spec.security.seccomp_profile, "/etc/sandcell/seccomp.json");
    }

    #[tokio::test]
    async fn request_caps_scale_into_the_spec() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner.clone());
        let cancel = CancellationToken::new();

        let mut req = request(SecurityProfile::Standard);
        req.limits = Limits {
            memory_bytes: 128 * 1024 * 1024,
            cpu_quota_millis: 250,
            pids_max: 64,
            ..Default::default()
        };

        let result = backend.execute(&cancel, req).await.unwrap();

        let spec = &runner.specs()[0];
        assert_eq!(spec.resources.memory_bytes, 128 * 1024 * 1024);
        assert_eq!(spec.resources.cpu_quota_micros, 250_000);
        assert_eq!(spec.resources.pids_limit, 64);

        assert!(result.limits_enforced.memory);
        assert!(result.limits_enforced.cpu);
        assert!(result.limits_enforced.pids);
        assert!(!result.limits_enforced.disk);
    }

    #[tokio::test]
    async fn unrequested_caps_report_unenforced() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner);
        let cancel = CancellationToken::new();

        let result = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap();

        assert!(result.limits_enforced.timeout);
        assert!(result.limits_enforced.tool_calls);
        assert!(!result.limits_enforced.memory);
        assert!(!result.limits_enforced.cpu);
        assert!(!result.limits_enforced.pids);
    }

    #[tokio::test]
    async fn stdout_sentinel_becomes_the_value() {
        let runner = Arc::new(MockContainerRunner::new());
        runner.push_outcome(Ok(ContainerOutcome {
            exit_code: 0,
            stdout: "working\n__OUT__:{\"answer\":7}\n".into(),
            stderr: String::new(),
            duration: Duration::from_millis(40),
        }));
        let backend = backend_with(runner);
        let cancel = CancellationToken::new();

        let result = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap();
        assert_eq!(result.value, Some(json!({"answer": 7})));
        assert_eq!(result.duration, Duration::from_millis(40));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_through_the_result() {
        let runner = Arc::new(MockContainerRunner::new());
        runner.push_outcome(Ok(ContainerOutcome {
            exit_code: 2,
            stdout: String::new(),
            stderr: "NameError: name 'x' is not defined".into(),
            duration: Duration::from_millis(12),
        }));
        let backend = backend_with(runner);
        let cancel = CancellationToken::new();

        let result = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap();
        assert!(result.stderr.contains("NameError"));
        assert_eq!(result.value, None);
    }

    #[tokio::test]
    async fn runner_errors_keep_their_kind_and_gain_context() {
        let runner = Arc::new(MockContainerRunner::new());
        runner.push_outcome(Err(Error::new(
            ErrorKind::ImagePull,
            "image pull failed: registry unreachable",
        )));
        let backend = backend_with(runner);
        let cancel = CancellationToken::new();

        let err = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImagePull);
        assert!(err.retryable());
        assert_eq!(err.backend(), Some(BackendKind::Docker));
    }

    #[tokio::test]
    async fn cancelled_handle_fails_before_the_runner() {
        let runner = Arc::new(MockContainerRunner::new());
        let backend = backend_with(runner.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = backend
            .execute(&cancel, request(SecurityProfile::Standard))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(runner.specs().is_empty());
    }
}
