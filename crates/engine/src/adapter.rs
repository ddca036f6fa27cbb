//! The engine adapter.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sandcell_core::{
    Error, ErrorKind, ExecuteRequest, ExecuteResult, Limits, Runtime, SecurityProfile,
};

use crate::contract::{EngineError, EngineOutput, EngineToolCall, ExecuteParams, Tools};
use crate::wrapper::wrap_tools;

// =============================================================================
// Engine
// =============================================================================

/// Implements the orchestrator's execution contract over a [`Runtime`].
///
/// The security profile is fixed at construction; a runtime is required by
/// the type, so a misconfigured engine cannot be built at all.
pub struct Engine {
    runtime: Arc<dyn Runtime>,
    profile: SecurityProfile,
}

impl Engine {
    /// Create an engine over the given runtime with the standard profile.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            runtime,
            profile: SecurityProfile::Standard,
        }
    }

    /// Use a different fixed security profile.
    pub fn with_profile(mut self, profile: SecurityProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Execute code on behalf of the orchestrator.
    ///
    /// Wraps `tools` as the request's gateway, delegates to the runtime, and
    /// translates the result and error kinds.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        params: ExecuteParams,
        tools: Arc<dyn Tools>,
    ) -> std::result::Result<EngineOutput, EngineError> {
        let req = ExecuteRequest {
            language: params.language,
            code: params.code,
            timeout: params.timeout,
            limits: Limits {
                max_tool_calls: params.max_tool_calls,
                ..Default::default()
            },
            profile: Some(self.profile),
            gateway: Some(wrap_tools(tools)),
            metadata: Default::default(),
        };

        match self.runtime.execute(cancel, req).await {
            Ok(result) => Ok(map_output(result)),
            Err(err) => Err(map_error(err)),
        }
    }
}

fn map_output(result: ExecuteResult) -> EngineOutput {
    EngineOutput {
        value: result.value,
        stdout: result.stdout,
        stderr: result.stderr,
        tool_calls: result
            .tool_calls
            .into_iter()
            .map(|record| EngineToolCall {
                tool_id: record.tool_id,
                backend_kind: record.backend_kind,
                duration_ms: record.duration.as_millis() as u64,
                error_op: record.error_op,
            })
            .collect(),
        duration_ms: result.duration.as_millis() as u64,
    }
}

fn map_error(err: Error) -> EngineError {
    match err.kind() {
        ErrorKind::Timeout | ErrorKind::ResourceLimit => EngineError::LimitExceeded(err),
        ErrorKind::SandboxViolation => EngineError::ExecutionFailed(err),
        _ => EngineError::Runtime(err),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sandcell_core::mocks::MockRuntime;
    use sandcell_core::{
        BackendInfo, BackendKind, ChainStep, DetailLevel, Result, RunOutcome, StepOutcome,
        ToolCallRecord, ToolDoc, ToolExample, ToolSummary,
    };
    use serde_json::{json, Value};
    use std::time::Duration;

    struct NoopTools;

    #[async_trait]
    impl Tools for NoopTools {
        async fn search_tools(&self, _query: &str, _limit: usize) -> Result<Vec<ToolSummary>> {
            Ok(Vec::new())
        }

        async fn list_namespaces(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn describe_tool(&self, _id: &str, _level: DetailLevel) -> Result<ToolDoc> {
            Ok(ToolDoc::default())
        }

        async fn list_tool_examples(&self, _id: &str, _max: usize) -> Result<Vec<ToolExample>> {
            Ok(Vec::new())
        }

        async fn run_tool(&self, _id: &str, _args: Value) -> Result<RunOutcome> {
            Ok(RunOutcome::default())
        }

        async fn run_chain(
            &self,
            _steps: &[ChainStep],
        ) -> Result<(RunOutcome, Vec<StepOutcome>)> {
            Ok((RunOutcome::default(), Vec::new()))
        }
    }

    fn params() -> ExecuteParams {
        ExecuteParams {
            code: "__out = 1".into(),
            max_tool_calls: 5,
            ..Default::default()
        }
    }

    fn success_result() -> ExecuteResult {
        ExecuteResult {
            value: Some(json!("hello")),
            stdout: "printed\n".into(),
            stderr: String::new(),
            tool_calls: vec![ToolCallRecord {
                tool_id: "mock:tool0".into(),
                backend_kind: "mock".into(),
                duration: Duration::from_millis(250),
                error_op: None,
            }],
            duration: Duration::from_millis(1_500),
            backend: BackendInfo::new(BackendKind::Docker),
            limits_enforced: Default::default(),
        }
    }

    #[tokio::test]
    async fn maps_results_into_the_orchestrator_shape() {
        let engine = Engine::new(Arc::new(MockRuntime::new(success_result())));
        let cancel = CancellationToken::new();

        let output = engine
            .execute(&cancel, params(), Arc::new(NoopTools))
            .await
            .unwrap();

        assert_eq!(output.value, Some(json!("hello")));
        assert_eq!(output.stdout, "printed\n");
        assert_eq!(output.duration_ms, 1_500);
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].duration_ms, 250);
    }

    #[tokio::test]
    async fn timeout_and_resource_limit_collapse_to_limit_exceeded() {
        for kind in [ErrorKind::Timeout, ErrorKind::ResourceLimit] {
            let engine = Engine::new(Arc::new(MockRuntime::failing_with(kind)));
            let cancel = CancellationToken::new();

            let err = engine
                .execute(&cancel, params(), Arc::new(NoopTools))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::LimitExceeded(_)), "{kind:?}");
            assert_eq!(err.runtime_error().kind(), kind);
        }
    }

    #[tokio::test]
    async fn sandbox_violation_collapses_to_execution_failed() {
        let engine = Engine::new(Arc::new(MockRuntime::failing_with(
            ErrorKind::SandboxViolation,
        )));
        let cancel = CancellationToken::new();

        let err = engine
            .execute(&cancel, params(), Arc::new(NoopTools))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn other_kinds_pass_through() {
        for kind in [
            ErrorKind::BackendDenied,
            ErrorKind::RuntimeUnavailable,
            ErrorKind::ToolCallLimit,
            ErrorKind::Cancelled,
        ] {
            let engine = Engine::new(Arc::new(MockRuntime::failing_with(kind)));
            let cancel = CancellationToken::new();

            let err = engine
                .execute(&cancel, params(), Arc::new(NoopTools))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Runtime(_)), "{kind:?}");
            assert_eq!(err.runtime_error().kind(), kind);
        }
    }

    struct RecordingRuntime {
        last_profile: std::sync::Mutex<Option<SecurityProfile>>,
    }

    #[async_trait]
    impl Runtime for RecordingRuntime {
        async fn execute(
            &self,
            _cancel: &CancellationToken,
            req: ExecuteRequest,
        ) -> Result<ExecuteResult> {
            req.validate()?;
            *self.last_profile.lock().unwrap() = req.profile;
            Ok(success_result())
        }
    }

    #[tokio::test]
    async fn fixed_profile_is_applied_to_every_request() {
        let runtime = Arc::new(RecordingRuntime {
            last_profile: std::sync::Mutex::new(None),
        });
        let engine = Engine::new(runtime.clone()).with_profile(SecurityProfile::Hardened);
        let cancel = CancellationToken::new();

        // A passing call also proves the wrapper produced a gateway: the
        // recording runtime validates the request first.
        engine
            .execute(&cancel, params(), Arc::new(NoopTools))
            .await
            .unwrap();
        assert_eq!(
            *runtime.last_profile.lock().unwrap(),
            Some(SecurityProfile::Hardened)
        );
    }
}
