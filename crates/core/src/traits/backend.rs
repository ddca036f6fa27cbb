use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{BackendKind, ExecuteRequest, ExecuteResult};

/// A code execution backend. Each backend provides a different level of
/// isolation.
///
/// Contract:
/// - Validate the request before any side effect.
/// - Honor the cancellation handle and the request timeout, whichever fires
///   first, failing with `cancelled` or `timeout`.
/// - Stamp every result with [`BackendInfo`](crate::types::BackendInfo)
///   carrying this backend's kind.
/// - Report [`LimitsEnforced`](crate::types::LimitsEnforced) truthfully: a
///   cap the backend cannot enforce is reported `false`.
/// - Never run as a privileged identity on the host; deny host networking by
///   default.
/// - Treat all inputs as untrusted.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The constant identity of this backend.
    fn kind(&self) -> BackendKind;

    /// Run code with the given request parameters.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult>;
}
