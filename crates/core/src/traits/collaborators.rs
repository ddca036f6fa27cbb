use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{ChainStep, DetailLevel, RunOutcome, StepOutcome, ToolDoc, ToolExample, ToolSummary};

// =============================================================================
// External Collaborators
// =============================================================================
//
// The runtime consumes these interfaces; the real implementations live
// outside this workspace (tool index service, documentation store, tool
// execution service).

/// Tool discovery: search and namespace listing.
#[async_trait]
pub trait ToolIndex: Send + Sync {
    /// Search for tools matching the query, returning at most `limit` results.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ToolSummary>>;

    /// List all tool namespaces.
    async fn list_namespaces(&self) -> Result<Vec<String>>;
}

/// Tool documentation store.
#[async_trait]
pub trait ToolDocs: Send + Sync {
    /// Return documentation for a tool at the given detail level.
    async fn describe(&self, id: &str, level: DetailLevel) -> Result<ToolDoc>;

    /// Return up to `max` usage examples for a tool.
    async fn list_examples(&self, id: &str, max: usize) -> Result<Vec<ToolExample>>;
}

/// Tool execution runner.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Execute a single tool.
    async fn run(&self, cancel: &CancellationToken, id: &str, args: Value) -> Result<RunOutcome>;

    /// Execute a sequence of tool calls.
    ///
    /// The returned step results may be fewer than the requested steps when
    /// the runner stops early; callers account for the difference.
    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)>;
}
