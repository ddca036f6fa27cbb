//! In-process gateway delegating to the tool collaborators.
//!
//! The direct gateway runs on the host side of the trust boundary with no
//! isolation of its own. It enforces the two configured quotas (global tool
//! call counter, per-request chain ceiling) and records every invocation for
//! the runtime to harvest.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use sandcell_core::{
    ChainStep, DetailLevel, Error, Result, RunOutcome, StepOutcome, ToolCallRecord,
    ToolCallTracer, ToolDoc, ToolDocs, ToolExample, ToolGateway, ToolIndex, ToolRunner,
    ToolSummary,
};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`DirectGateway`].
pub struct DirectGatewayConfig {
    /// Tool index for search and namespace listing.
    pub index: Arc<dyn ToolIndex>,
    /// Documentation store.
    pub docs: Arc<dyn ToolDocs>,
    /// Tool execution runner.
    pub runner: Arc<dyn ToolRunner>,
    /// Global cap on tool invocations. Zero means unlimited.
    pub max_tool_calls: i64,
    /// Cap on steps per chain. Zero means unlimited.
    pub max_chain_steps: i64,
}

// =============================================================================
// Direct Gateway
// =============================================================================

struct TraceState {
    call_count: i64,
    records: Vec<ToolCallRecord>,
}

/// In-process [`ToolGateway`] over the index, docs, and runner collaborators.
pub struct DirectGateway {
    index: Arc<dyn ToolIndex>,
    docs: Arc<dyn ToolDocs>,
    runner: Arc<dyn ToolRunner>,
    max_tool_calls: i64,
    max_chain_steps: i64,
    state: Mutex<TraceState>,
}

impl DirectGateway {
    /// Create a direct gateway with the given configuration.
    pub fn new(cfg: DirectGatewayConfig) -> Self {
        Self {
            index: cfg.index,
            docs: cfg.docs,
            runner: cfg.runner,
            max_tool_calls: cfg.max_tool_calls,
            max_chain_steps: cfg.max_chain_steps,
            state: Mutex::new(TraceState {
                call_count: 0,
                records: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TraceState> {
        self.state.lock().expect("gateway state mutex poisoned")
    }

    fn check(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        Ok(())
    }

    /// Reserve `count` slots against the tool call counter.
    ///
    /// Reservation is atomic with the limit check so concurrent chains cannot
    /// over-allocate between check and increment.
    fn reserve(&self, count: i64) -> Result<()> {
        let mut state = self.state();
        if self.max_tool_calls > 0 && state.call_count + count > self.max_tool_calls {
            return Err(Error::tool_call_limit(format!(
                "would exceed max {} calls",
                self.max_tool_calls
            )));
        }
        state.call_count += count;
        Ok(())
    }

    /// Return unused reserved slots to the counter, never going below zero.
    fn refund(&self, count: i64) {
        let mut state = self.state();
        state.call_count -= count;
        if state.call_count < 0 {
            state.call_count = 0;
        }
    }
}

#[async_trait]
impl ToolGateway for DirectGateway {
    async fn search_tools(
        &self,
        cancel: &CancellationToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ToolSummary>> {
        Self::check(cancel)?;
        self.index.search(query, limit).await
    }

    async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        Self::check(cancel)?;
        self.index.list_namespaces().await
    }

    async fn describe_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        level: DetailLevel,
    ) -> Result<ToolDoc> {
        Self::check(cancel)?;
        self.docs.describe(id, level).await
    }

    async fn list_tool_examples(
        &self,
        cancel: &CancellationToken,
        id: &str,
        max: usize,
    ) -> Result<Vec<ToolExample>> {
        Self::check(cancel)?;
        self.docs.list_examples(id, max).await
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: Value,
    ) -> Result<RunOutcome> {
        Self::check(cancel)?;

        {
            let mut state = self.state();
            if self.max_tool_calls > 0 && state.call_count >= self.max_tool_calls {
                return Err(Error::tool_call_limit(format!(
                    "max {} calls exceeded",
                    self.max_tool_calls
                )));
            }
            state.call_count += 1;
        }

        let start = Instant::now();
        let outcome = self.runner.run(cancel, id, args).await;
        let duration = start.elapsed();

        let record = ToolCallRecord {
            tool_id: id.to_string(),
            backend_kind: outcome
                .as_ref()
                .map(|o| o.backend.clone())
                .unwrap_or_default(),
            duration,
            error_op: outcome.is_err().then(|| "run".to_string()),
        };
        self.state().records.push(record);

        outcome
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

        let requested = steps.len() as i64;
        if self.max_chain_steps > 0 && requested > self.max_chain_steps {
            return Err(Error::chain_step_limit(format!(
                "max {} steps exceeded (got {})",
                self.max_chain_steps, requested
            )));
        }

        // Reserve a slot per step up front; the runner is not called when the
        // chain would blow the call budget.
        self.reserve(requested)?;

        let start = Instant::now();
        let outcome = self.runner.run_chain(cancel, steps).await;
        let duration = start.elapsed();

        let (result, step_results) = match outcome {
            Ok(pair) => pair,
            Err(err) => {
                // Nothing executed; return the whole reservation.
                self.refund(requested);
                return Err(err);
            }
        };

        // A runner that reports no step results but succeeded is assumed to
        // have executed the whole chain.
        let mut executed = step_results.len() as i64;
        if executed == 0 {
            executed = requested;
        }
        executed = executed.min(requested);

        if executed < requested {
            self.refund(requested - executed);
        }

        let step_duration = duration / executed.max(1) as u32;

        {
            let mut state = self.state();
            for (i, step) in steps.iter().take(executed as usize).enumerate() {
                let step_result = step_results.get(i);
                state.records.push(ToolCallRecord {
                    tool_id: step.tool_id.clone(),
                    backend_kind: step_result.map(|r| r.backend.clone()).unwrap_or_default(),
                    duration: step_duration,
                    error_op: step_result
                        .is_some_and(|r| r.error.is_some())
                        .then(|| "chain".to_string()),
                });
            }
        }

        Ok((result, step_results))
    }

    fn tracer(&self) -> Option<&dyn ToolCallTracer> {
        Some(self)
    }
}

impl ToolCallTracer for DirectGateway {
    fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.state().records.clone()
    }

    fn reset(&self) {
        let mut state = self.state();
        state.call_count = 0;
        state.records.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
