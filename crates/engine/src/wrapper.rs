//! Adapts the orchestrator's [`Tools`] handle into a [`ToolGateway`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use sandcell_core::{
    ChainStep, DetailLevel, Error, Result, RunOutcome, StepOutcome, ToolDoc, ToolExample,
    ToolGateway, ToolSummary,
};

use crate::contract::Tools;

/// Wrap a [`Tools`] handle so it satisfies the gateway contract.
///
/// The wrapper injects the fail-fast cancellation check the gateway contract
/// requires; the handle itself has no cancellation plumbing. It reports no
/// tracer: recording stays with gateways that own quota enforcement.
pub fn wrap_tools(tools: Arc<dyn Tools>) -> Arc<dyn ToolGateway> {
    Arc::new(WrappedTools { tools })
}

struct WrappedTools {
    tools: Arc<dyn Tools>,
}

impl WrappedTools {
    fn check(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        Ok(())
    }
}

#[async_trait]
impl ToolGateway for WrappedTools {
    async fn search_tools(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ToolSummary>> {
        Self::check(cancel)?;
        self.tools.search_tools(query, limit).await
    }

    async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        Self::check(cancel)?;
        self.tools.list_namespaces().await
    }

    async fn describe_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        level: DetailLevel,
    ) -> Result<ToolDoc> {
        Self::check(cancel)?;
        self.tools.describe_tool(id, level).await
    }

    async fn list_tool_examples(
        &self,
        cancel: &CancellationToken,
        id: &str,
        max: usize,
    ) -> Result<Vec<ToolExample>> {
        Self::check(cancel)?;
        self.tools.list_tool_examples(id, max).await
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: Value,
    ) -> Result<RunOutcome> {
        Self::check(cancel)?;
        self.tools.run_tool(id, args).await
    }

    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)> {
        Self::check(cancel)?;
        if steps.is_empty() {
            return Ok((RunOutcome::default(), Vec::new()));
        }
        self.tools.run_chain(steps).await
    }
}
