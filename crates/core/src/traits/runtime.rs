use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{ExecuteRequest, ExecuteResult};

/// The main entry point for code execution.
///
/// A runtime routes each request to a backend chosen by security profile.
///
/// Contract:
/// - Safe for concurrent use.
/// - Honors cancellation and deadlines, failing with `cancelled`.
/// - Validation failures surface as `missing-gateway` / `missing-code` /
///   `invalid-limits`; selection failures as `runtime-unavailable` /
///   `backend-denied`.
/// - Requests are read-only; results are caller-owned snapshots.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Execute code, selecting a backend by security profile.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult>;
}
