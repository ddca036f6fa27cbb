//! The orchestrator-side execution contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error as ThisError;

use sandcell_core::{
    ChainStep, DetailLevel, Error, Result, RunOutcome, StepOutcome, ToolDoc, ToolExample,
    ToolSummary,
};

// =============================================================================
// Parameters and output
// =============================================================================

/// Execution parameters as the orchestrator expresses them.
#[derive(Debug, Clone, Default)]
pub struct ExecuteParams {
    /// Language tag of the code. Empty means the backend's default.
    pub language: String,
    /// The source code to execute.
    pub code: String,
    /// Maximum execution duration. Zero means the runtime's default.
    pub timeout: Duration,
    /// Cap on tool invocations. Zero means unlimited.
    pub max_tool_calls: i64,
}

/// One tool invocation as reported back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineToolCall {
    /// Canonical identifier of the tool.
    pub tool_id: String,
    /// Tag of the runner backend that executed it.
    pub backend_kind: String,
    /// Execution time in milliseconds.
    pub duration_ms: u64,
    /// The operation that failed, if any.
    pub error_op: Option<String>,
}

/// Execution outcome as the orchestrator consumes it.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Final value of the snippet.
    pub value: Option<Value>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Ordered tool invocations.
    pub tool_calls: Vec<EngineToolCall>,
    /// Total execution time in milliseconds.
    pub duration_ms: u64,
}

// =============================================================================
// Tools capability handle
// =============================================================================

/// The orchestrator's tool capability handle.
///
/// Mirrors the gateway surface without the runtime's cancellation plumbing;
/// [`wrap_tools`](crate::wrapper::wrap_tools) adapts it into a gateway.
#[async_trait]
pub trait Tools: Send + Sync {
    /// Search for tools matching the query.
    async fn search_tools(&self, query: &str, limit: usize) -> Result<Vec<ToolSummary>>;

    /// List all tool namespaces.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Return documentation for a tool.
    async fn describe_tool(&self, id: &str, level: DetailLevel) -> Result<ToolDoc>;

    /// Return up to `max` usage examples for a tool.
    async fn list_tool_examples(&self, id: &str, max: usize) -> Result<Vec<ToolExample>>;

    /// Execute a single tool.
    async fn run_tool(&self, id: &str, args: Value) -> Result<RunOutcome>;

    /// Execute a sequence of tool calls.
    async fn run_chain(&self, steps: &[ChainStep]) -> Result<(RunOutcome, Vec<StepOutcome>)>;
}

// =============================================================================
// Errors
// =============================================================================

/// The orchestrator-facing error taxonomy.
///
/// Runtime `timeout` and `resource-limit` collapse to [`EngineError::LimitExceeded`];
/// `sandbox-violation` collapses to [`EngineError::ExecutionFailed`]; every
/// other kind passes through unchanged.
#[derive(Debug, ThisError)]
pub enum EngineError {
    /// A time or resource budget was exhausted.
    #[error("limit exceeded: {0}")]
    LimitExceeded(#[source] Error),

    /// The snippet attempted something the sandbox forbids.
    #[error("code execution failed: {0}")]
    ExecutionFailed(#[source] Error),

    /// Any other runtime failure, passed through unchanged.
    #[error(transparent)]
    Runtime(#[from] Error),
}

impl EngineError {
    /// The underlying runtime error.
    pub fn runtime_error(&self) -> &Error {
        match self {
            EngineError::LimitExceeded(err) => err,
            EngineError::ExecutionFailed(err) => err,
            EngineError::Runtime(err) => err,
        }
    }
}
