//! Error types for the sandcell runtime.
//!
//! Every failure in the runtime carries one of a closed set of [`ErrorKind`]s
//! so that callers can match on the kind without inspecting messages. Errors
//! can be wrapped with operation and backend context; wrapping preserves the
//! innermost kind and its retryability.

use std::error::Error as StdError;
use std::fmt;

use crate::types::BackendKind;

/// Result type alias using the runtime's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Error Kinds
// =============================================================================

/// The closed set of error kinds produced by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request has no tool gateway.
    MissingGateway,
    /// The request has empty code.
    MissingCode,
    /// A resource limit field is negative.
    InvalidLimits,
    /// Any other request validation failure.
    InvalidRequest,
    /// The ambient cancellation handle fired.
    Cancelled,
    /// No backend is registered for the requested profile.
    RuntimeUnavailable,
    /// Security policy forbids the selected backend for the profile.
    BackendDenied,
    /// Execution exceeded the configured deadline.
    Timeout,
    /// A resource cap was reached during execution.
    ResourceLimit,
    /// Sandboxed code attempted a disallowed action.
    SandboxViolation,
    /// The gateway rejected a tool call over the call quota.
    ToolCallLimit,
    /// The gateway rejected a chain longer than the step quota.
    ChainStepLimit,
    /// The unsafe backend was invoked without explicit opt-in.
    OptInRequired,
    /// The backend has no runner binding configured.
    ClientNotConfigured,
    /// The container daemon or control plane is unreachable.
    DaemonUnavailable,
    /// Pulling the execution image failed.
    ImagePull,
    /// Container creation failed.
    ContainerCreate,
    /// Container start failed.
    ContainerStart,
    /// Waiting for container completion failed.
    ContainerWait,
    /// A container spec violates security policy.
    SecurityViolation,
    /// A container spec is otherwise invalid.
    InvalidSpec,
    /// The proxy gateway's peer is gone.
    ConnectionClosed,
    /// The framed protocol was violated.
    Protocol,
}

impl ErrorKind {
    /// The kebab-case string form, used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingGateway => "missing-gateway",
            ErrorKind::MissingCode => "missing-code",
            ErrorKind::InvalidLimits => "invalid-limits",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RuntimeUnavailable => "runtime-unavailable",
            ErrorKind::BackendDenied => "backend-denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ResourceLimit => "resource-limit",
            ErrorKind::SandboxViolation => "sandbox-violation",
            ErrorKind::ToolCallLimit => "tool-call-limit",
            ErrorKind::ChainStepLimit => "chain-step-limit",
            ErrorKind::OptInRequired => "opt-in-required",
            ErrorKind::ClientNotConfigured => "client-not-configured",
            ErrorKind::DaemonUnavailable => "daemon-unavailable",
            ErrorKind::ImagePull => "image-pull",
            ErrorKind::ContainerCreate => "container-create",
            ErrorKind::ContainerStart => "container-start",
            ErrorKind::ContainerWait => "container-wait",
            ErrorKind::SecurityViolation => "security-violation",
            ErrorKind::InvalidSpec => "invalid-spec",
            ErrorKind::ConnectionClosed => "connection-closed",
            ErrorKind::Protocol => "protocol",
        }
    }

    /// Parse the kebab-case string form back into a kind.
    pub fn parse(s: &str) -> Option<ErrorKind> {
        let all = [
            ErrorKind::MissingGateway,
            ErrorKind::MissingCode,
            ErrorKind::InvalidLimits,
            ErrorKind::InvalidRequest,
            ErrorKind::Cancelled,
            ErrorKind::RuntimeUnavailable,
            ErrorKind::BackendDenied,
            ErrorKind::Timeout,
            ErrorKind::ResourceLimit,
            ErrorKind::SandboxViolation,
            ErrorKind::ToolCallLimit,
            ErrorKind::ChainStepLimit,
            ErrorKind::OptInRequired,
            ErrorKind::ClientNotConfigured,
            ErrorKind::DaemonUnavailable,
            ErrorKind::ImagePull,
            ErrorKind::ContainerCreate,
            ErrorKind::ContainerStart,
            ErrorKind::ContainerWait,
            ErrorKind::SecurityViolation,
            ErrorKind::InvalidSpec,
            ErrorKind::ConnectionClosed,
            ErrorKind::Protocol,
        ];
        all.into_iter().find(|k| k.as_str() == s)
    }

    /// Whether errors of this kind are retryable unless overridden.
    ///
    /// Infrastructure failures (timeouts, daemon outages, container lifecycle
    /// failures) are transient; validation, policy, and quota errors are not.
    pub fn retryable_by_default(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::ResourceLimit
                | ErrorKind::DaemonUnavailable
                | ErrorKind::ImagePull
                | ErrorKind::ContainerCreate
                | ErrorKind::ContainerStart
                | ErrorKind::ContainerWait
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Error
// =============================================================================

/// A classified runtime error with optional execution context.
///
/// Equality of interest is by [`ErrorKind`]: callers match on `err.kind()`.
/// The `op` and `backend` fields identify where the failure happened; the
/// optional source preserves the underlying cause for error-chain reporting.
pub struct Error {
    kind: ErrorKind,
    message: String,
    op: Option<String>,
    backend: Option<BackendKind>,
    retryable: bool,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    /// Create an error of the given kind with a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            op: None,
            backend: None,
            retryable: kind.retryable_by_default(),
            source: None,
        }
    }

    /// Wrap an existing error with operation context.
    ///
    /// The innermost kind and retryability are preserved; the wrapped error
    /// becomes the source of the new one.
    pub fn wrap(op: impl Into<String>, cause: Error) -> Self {
        Self {
            kind: cause.kind,
            message: String::new(),
            op: Some(op.into()),
            backend: cause.backend,
            retryable: cause.retryable,
            source: Some(Box::new(cause)),
        }
    }

    // -------------------------------------------------------------------------
    // Constructors for the common kinds
    // -------------------------------------------------------------------------

    /// The request has no gateway.
    pub fn missing_gateway() -> Self {
        Self::new(ErrorKind::MissingGateway, "gateway is required")
    }

    /// The request has no code.
    pub fn missing_code() -> Self {
        Self::new(ErrorKind::MissingCode, "code is required")
    }

    /// A limits field is invalid.
    pub fn invalid_limits(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidLimits, message)
    }

    /// Any other request validation failure.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// The ambient cancellation handle fired.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    /// No backend is available for the request.
    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeUnavailable, message)
    }

    /// Policy forbids the selected backend.
    pub fn backend_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendDenied, message)
    }

    /// Execution exceeded its deadline.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// A resource cap was reached.
    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLimit, message)
    }

    /// Sandboxed code attempted a disallowed action.
    pub fn sandbox_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SandboxViolation, message)
    }

    /// The gateway's tool call quota was exceeded.
    pub fn tool_call_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolCallLimit, message)
    }

    /// The gateway's chain step quota was exceeded.
    pub fn chain_step_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ChainStepLimit, message)
    }

    /// The backend has no runner binding.
    pub fn client_not_configured(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClientNotConfigured, message)
    }

    /// The container daemon is unreachable.
    pub fn daemon_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DaemonUnavailable, message)
    }

    /// A container spec violates security policy.
    pub fn security_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecurityViolation, message)
    }

    /// A container spec is otherwise invalid.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSpec, message)
    }

    /// The proxy gateway's peer is gone.
    pub fn connection_closed() -> Self {
        Self::new(ErrorKind::ConnectionClosed, "connection closed")
    }

    /// The framed protocol was violated.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    /// Attach the operation that failed.
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Attach the backend that was in use.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the retryability flag.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The classified kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the operation can be retried.
    pub fn retryable(&self) -> bool {
        self.retryable
    }

    /// The operation that failed, if recorded.
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// The backend that was in use, if recorded.
    pub fn backend(&self) -> Option<BackendKind> {
        self.backend
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "{}: ", backend)?;
        }
        if let Some(op) = &self.op {
            write!(f, "{}: ", op)?;
        }
        if self.message.is_empty() {
            f.write_str(self.kind.as_str())?;
        } else {
            f.write_str(&self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("op", &self.op)
            .field("backend", &self.backend)
            .field("retryable", &self.retryable)
            .field("source", &self.source)
            .finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn StdError + 'static))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_round_trip() {
        for kind in [
            ErrorKind::MissingGateway,
            ErrorKind::Timeout,
            ErrorKind::ToolCallLimit,
            ErrorKind::ContainerWait,
            ErrorKind::Protocol,
        ] {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("no-such-kind"), None);
    }

    #[test]
    fn wrap_preserves_innermost_kind() {
        let inner = Error::timeout("deadline exceeded").with_backend(BackendKind::Docker);
        let wrapped = Error::wrap("execute", inner);
        let rewrapped = Error::wrap("engine", wrapped);

        assert_eq!(rewrapped.kind(), ErrorKind::Timeout);
        assert!(rewrapped.retryable());
        assert_eq!(rewrapped.backend(), Some(BackendKind::Docker));
    }

    #[test]
    fn retryability_defaults() {
        assert!(Error::timeout("t").retryable());
        assert!(Error::daemon_unavailable("d").retryable());
        assert!(!Error::missing_gateway().retryable());
        assert!(!Error::backend_denied("b").retryable());
        assert!(!Error::runtime_unavailable("r").retryable());
        assert!(Error::runtime_unavailable("r").with_retryable(true).retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::ContainerStart, "container start failed")
            .with_op("start")
            .with_backend(BackendKind::Docker);
        let rendered = err.to_string();
        assert!(rendered.contains("docker"));
        assert!(rendered.contains("start"));
        assert!(rendered.contains("container start failed"));
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::daemon_unavailable("ping failed").with_source(io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("boom"));
    }
}
