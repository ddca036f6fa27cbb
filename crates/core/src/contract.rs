//! Contract checks that every gateway, backend, and runtime implementation
//! must pass.
//!
//! Each checker panics with a labeled assertion on violation; integration
//! tests call them against concrete implementations. The checks only rely on
//! behavior the respective trait contracts promise, so they are safe to run
//! against any implementation, including cross-boundary ones.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;
use crate::traits::{Backend, Runtime, ToolGateway};
use crate::types::{BackendKind, DetailLevel, ExecuteRequest, Limits};

// =============================================================================
// Gateway Contract
// =============================================================================

/// Check the universal [`ToolGateway`] contract.
pub async fn check_gateway_contract(gateway: Arc<dyn ToolGateway>) {
    let cancel = CancellationToken::new();

    // Search respects the limit and tolerates an empty query.
    let results = gateway
        .search_tools(&cancel, "", 5)
        .await
        .expect("search_tools with empty query must not fail");
    assert!(
        results.len() <= 5,
        "search_tools returned {} results, want <= 5",
        results.len()
    );

    // Namespace listing succeeds.
    gateway
        .list_namespaces(&cancel)
        .await
        .expect("list_namespaces must not fail");

    // An empty chain succeeds and produces no step results.
    let (_, steps) = gateway
        .run_chain(&cancel, &[])
        .await
        .expect("run_chain with no steps must not fail");
    assert!(
        steps.is_empty(),
        "run_chain with no steps returned {} results",
        steps.len()
    );

    // Every operation fails fast once the handle is cancelled.
    let cancelled = CancellationToken::new();
    cancelled.cancel();

    let err = gateway
        .search_tools(&cancelled, "q", 1)
        .await
        .expect_err("search_tools must fail on a cancelled handle");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "search_tools: {err}");

    let err = gateway
        .list_namespaces(&cancelled)
        .await
        .expect_err("list_namespaces must fail on a cancelled handle");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "list_namespaces: {err}");

    let err = gateway
        .describe_tool(&cancelled, "mock:tool0", DetailLevel::Summary)
        .await
        .expect_err("describe_tool must fail on a cancelled handle");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "describe_tool: {err}");

    let err = gateway
        .list_tool_examples(&cancelled, "mock:tool0", 3)
        .await
        .expect_err("list_tool_examples must fail on a cancelled handle");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "list_tool_examples: {err}");

    let err = gateway
        .run_tool(&cancelled, "mock:tool0", serde_json::Value::Null)
        .await
        .expect_err("run_tool must fail on a cancelled handle");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "run_tool: {err}");
}

// =============================================================================
// Backend Contract
// =============================================================================

/// Check the universal [`Backend`] contract.
///
/// `exercise` optionally supplies a request that is expected to execute
/// successfully on this backend; when given, the result's backend stamp is
/// verified against `expected_kind`.
pub async fn check_backend_contract(
    backend: Arc<dyn Backend>,
    gateway: Arc<dyn ToolGateway>,
    expected_kind: BackendKind,
    exercise: Option<ExecuteRequest>,
) {
    let cancel = CancellationToken::new();

    assert_eq!(backend.kind(), expected_kind, "kind must be constant");

    // Missing gateway.
    let req = ExecuteRequest {
        code: "__out = 1".into(),
        ..Default::default()
    };
    let err = backend
        .execute(&cancel, req)
        .await
        .expect_err("execute without gateway must fail");
    assert_eq!(err.kind(), ErrorKind::MissingGateway, "{err}");

    // Missing code.
    let req = ExecuteRequest {
        gateway: Some(gateway.clone()),
        ..Default::default()
    };
    let err = backend
        .execute(&cancel, req)
        .await
        .expect_err("execute without code must fail");
    assert_eq!(err.kind(), ErrorKind::MissingCode, "{err}");

    // Invalid limits.
    let req = ExecuteRequest {
        gateway: Some(gateway.clone()),
        code: "__out = 1".into(),
        limits: Limits {
            max_tool_calls: -1,
            ..Default::default()
        },
        ..Default::default()
    };
    let err = backend
        .execute(&cancel, req)
        .await
        .expect_err("execute with negative limits must fail");
    assert_eq!(err.kind(), ErrorKind::InvalidLimits, "{err}");

    // A cancelled handle fails without side effects.
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let req = ExecuteRequest {
        gateway: Some(gateway.clone()),
        code: "__out = 1".into(),
        ..Default::default()
    };
    let err = backend
        .execute(&cancelled, req)
        .await
        .expect_err("execute with a cancelled handle must fail");
    assert!(
        matches!(err.kind(), ErrorKind::Cancelled | ErrorKind::Timeout),
        "cancelled execute: got {:?}",
        err.kind()
    );

    // Backend stamp on a successful execution.
    if let Some(req) = exercise {
        let result = backend
            .execute(&cancel, req)
            .await
            .expect("exercise request must execute");
        assert_eq!(
            result.backend.kind, expected_kind,
            "result must be stamped with the backend's kind"
        );
    }
}

// =============================================================================
// Runtime Contract
// =============================================================================

/// Check the universal [`Runtime`] contract.
pub async fn check_runtime_contract(runtime: Arc<dyn Runtime>, gateway: Arc<dyn ToolGateway>) {
    let cancel = CancellationToken::new();

    // Validation happens before routing.
    let req = ExecuteRequest {
        code: "__out = 1".into(),
        ..Default::default()
    };
    let err = runtime
        .execute(&cancel, req)
        .await
        .expect_err("execute without gateway must fail");
    assert_eq!(err.kind(), ErrorKind::MissingGateway, "{err}");

    // A cancelled handle fails fast.
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let req = ExecuteRequest {
        gateway: Some(gateway),
        code: "__out = 1".into(),
        ..Default::default()
    };
    let err = runtime
        .execute(&cancelled, req)
        .await
        .expect_err("execute with a cancelled handle must fail");
    assert_eq!(err.kind(), ErrorKind::Cancelled, "{err}");
}
