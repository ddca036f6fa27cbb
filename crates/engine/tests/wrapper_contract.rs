//! The wrapped tools handle satisfies the gateway contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use sandcell_core::contract::check_gateway_contract;
use sandcell_core::{
    ChainStep, DetailLevel, Result, RunOutcome, StepOutcome, ToolDoc, ToolExample, ToolSummary,
};
use sandcell_engine::{wrap_tools, Tools};

struct StaticTools;

#[async_trait]
impl Tools for StaticTools {
    async fn search_tools(&self, _query: &str, limit: usize) -> Result<Vec<ToolSummary>> {
        Ok((0..3.min(limit))
            .map(|i| ToolSummary {
                id: format!("static:tool{i}"),
                ..Default::default()
            })
            .collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(vec!["static".into()])
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

    async fn run_chain(&self, steps: &[ChainStep]) -> Result<(RunOutcome, Vec<StepOutcome>)> {
        Ok((
            RunOutcome::default(),
            steps
                .iter()
                .map(|step| StepOutcome {
                    tool_id: step.tool_id.clone(),
                    ..Default::default()
                })
                .collect(),
        ))
    }
}

#[tokio::test]
async fn wrapped_tools_pass_the_gateway_contract() {
    check_gateway_contract(wrap_tools(Arc::new(StaticTools))).await;
}

#[tokio::test]
async fn wrapped_tools_report_no_tracer() {
    let gateway = wrap_tools(Arc::new(StaticTools));
    assert!(gateway.tracer().is_none());
}
