use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{
    ChainStep, DetailLevel, RunOutcome, StepOutcome, ToolCallRecord, ToolDoc, ToolExample,
    ToolSummary,
};

// =============================================================================
// Tool Gateway
// =============================================================================

/// The narrow capability surface exposed to sandboxed code.
///
/// The gateway is the only permitted traversal of the trust boundary: a
/// snippet can discover and invoke tools through it and nothing else.
///
/// Contract:
/// - Every operation checks the cancellation handle at entry and fails fast
///   with a `cancelled` error if it already fired.
/// - Implementations are safe for concurrent use by independent callers.
/// - Arguments are read-only; returned results are freshly owned.
/// - `run_tool` and `run_chain` record one [`ToolCallRecord`] per executed
///   step, in invocation order.
/// - When configured, a global `max_tool_calls` counter and a per-request
///   `max_chain_steps` ceiling are enforced. `run_chain` with no steps
///   succeeds and records nothing.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Search for tools matching the query.
    async fn search_tools(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ToolSummary>>;

    /// List all available tool namespaces.
    async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    /// Return documentation for a tool at the given detail level.
    async fn describe_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        level: DetailLevel,
    ) -> Result<ToolDoc>;

    /// Return up to `max` usage examples for a tool.
    async fn list_tool_examples(
        &self,
        cancel: &CancellationToken,
        id: &str,
        max: usize,
    ) -> Result<Vec<ToolExample>>;

    /// Execute a single tool.
    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: Value,
    ) -> Result<RunOutcome>;

    /// Execute a sequence of tool calls.
    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)>;

    /// The optional tracing capability of this gateway.
    ///
    /// Gateways that record tool calls expose the trace here; the runtime
    /// harvests it after execution. Cross-boundary gateways whose trace lives
    /// on the host side return `None`.
    fn tracer(&self) -> Option<&dyn ToolCallTracer> {
        None
    }
}

/// Capability of reporting a tool call trace.
///
/// Returned snapshots are caller-owned copies; concurrent recording may
/// continue while a snapshot is read.
pub trait ToolCallTracer: Send + Sync {
    /// A snapshot of all recorded tool calls, in invocation order.
    fn tool_calls(&self) -> Vec<ToolCallRecord>;

    /// Clear recorded calls and reset the call counter for reuse.
    fn reset(&self);
}
