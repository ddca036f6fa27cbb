//! Mock implementations of the core traits for testing.
//!
//! Scripted collaborators (index, docs, runner), a minimal gateway, and a
//! scripted backend/runtime. Used by the unit and integration tests across
//! the workspace and by the contract harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};
use crate::traits::{
    Backend, Runtime, ToolCallTracer, ToolDocs, ToolGateway, ToolIndex, ToolRunner,
};
use crate::types::{
    BackendInfo, BackendKind, ChainStep, DetailLevel, ExecuteRequest, ExecuteResult,
    LimitsEnforced, RunOutcome, SecurityProfile, StepOutcome, ToolCallRecord, ToolDoc,
    ToolExample, ToolSummary,
};

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled());
    }
    Ok(())
}

// =============================================================================
// Mock Tool Index
// =============================================================================

/// In-memory tool index over a fixed list of summaries.
#[derive(Default)]
pub struct MockIndex {
    summaries: Vec<ToolSummary>,
    namespaces: Vec<String>,
}

impl MockIndex {
    /// An index over the given summaries and namespaces.
    pub fn new(summaries: Vec<ToolSummary>, namespaces: Vec<String>) -> Self {
        Self {
            summaries,
            namespaces,
        }
    }

    /// An index with `n` generated tools in the `"mock"` namespace.
    pub fn with_tools(n: usize) -> Self {
        let summaries = (0..n)
            .map(|i| ToolSummary {
                id: format!("mock:tool{i}"),
                name: format!("tool{i}"),
                namespace: "mock".into(),
                short_description: format!("mock tool {i}"),
                tags: vec!["mock".into()],
            })
            .collect();
        Self::new(summaries, vec!["mock".into()])
    }
}

#[async_trait]
impl ToolIndex for MockIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ToolSummary>> {
        let matches = self
            .summaries
            .iter()
            .filter(|s| query.is_empty() || s.id.contains(query) || s.name.contains(query))
            .take(limit)
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.namespaces.clone())
    }
}

// =============================================================================
// Mock Docs Store
// =============================================================================

/// In-memory docs store over fixed docs and examples.
#[derive(Default)]
pub struct MockDocs {
    docs: HashMap<String, ToolDoc>,
    examples: HashMap<String, Vec<ToolExample>>,
}

impl MockDocs {
    /// Add documentation for a tool.
    pub fn with_doc(mut self, id: impl Into<String>, doc: ToolDoc) -> Self {
        self.docs.insert(id.into(), doc);
        self
    }

    /// Add examples for a tool.
    pub fn with_examples(mut self, id: impl Into<String>, examples: Vec<ToolExample>) -> Self {
        self.examples.insert(id.into(), examples);
        self
    }
}

#[async_trait]
impl ToolDocs for MockDocs {
    async fn describe(&self, id: &str, _level: DetailLevel) -> Result<ToolDoc> {
        self.docs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::invalid_request(format!("unknown tool: {id}")))
    }

    async fn list_examples(&self, id: &str, max: usize) -> Result<Vec<ToolExample>> {
        Ok(self
            .examples
            .get(id)
            .map(|ex| ex.iter().take(max).cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Mock Tool Runner
// =============================================================================

/// Scripted tool runner.
///
/// By default every run succeeds and a chain produces one step outcome per
/// step. Tests can limit how many chain steps "actually execute", fail
/// individual steps, or queue errors.
#[derive(Default)]
pub struct MockRunner {
    run_errors: Mutex<Vec<Error>>,
    chain_executed: Mutex<Option<usize>>,
    failed_steps: Mutex<Vec<usize>>,
    run_calls: AtomicUsize,
    chain_calls: AtomicUsize,
}

impl MockRunner {
    /// A runner where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next `run` call.
    pub fn push_run_error(&self, err: Error) {
        self.run_errors.lock().unwrap().push(err);
    }

    /// Make chains return only the first `n` step outcomes.
    pub fn set_chain_executed(&self, n: usize) {
        *self.chain_executed.lock().unwrap() = Some(n);
    }

    /// Mark a step index as failing (its outcome carries an error).
    pub fn fail_step(&self, index: usize) {
        self.failed_steps.lock().unwrap().push(index);
    }

    /// Number of `run` invocations so far.
    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    /// Number of `run_chain` invocations so far.
    pub fn chain_calls(&self) -> usize {
        self.chain_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolRunner for MockRunner {
    async fn run(&self, cancel: &CancellationToken, id: &str, args: Value) -> Result<RunOutcome> {
        check(cancel)?;
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.run_errors.lock().unwrap().pop() {
            return Err(err);
        }
        Ok(RunOutcome {
            structured: json!({ "tool": id, "args": args }),
            backend: "mock".into(),
        })
    }

    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)> {
        check(cancel)?;
        self.chain_calls.fetch_add(1, Ordering::SeqCst);

        let executed = self
            .chain_executed
            .lock()
            .unwrap()
            .unwrap_or(steps.len())
            .min(steps.len());
        let failed = self.failed_steps.lock().unwrap().clone();

        let outcomes: Vec<StepOutcome> = steps[..executed]
            .iter()
            .enumerate()
            .map(|(i, step)| StepOutcome {
                tool_id: step.tool_id.clone(),
                structured: json!({ "step": i }),
                error: failed.contains(&i).then(|| "step failed".to_string()),
                backend: "mock".into(),
            })
            .collect();

        let last = outcomes
            .iter()
            .rev()
            .find(|o| o.succeeded())
            .map(|o| o.structured.clone())
            .unwrap_or(Value::Null);

        Ok((
            RunOutcome {
                structured: last,
                backend: "mock".into(),
            },
            outcomes,
        ))
    }
}

// =============================================================================
// Mock Gateway
// =============================================================================

/// Minimal gateway that satisfies the contract without collaborators.
///
/// Records pushed via [`MockGateway::push_record`] are reported through the
/// tracer capability, which lets router tests exercise trace harvesting.
#[derive(Default)]
pub struct MockGateway {
    records: Mutex<Vec<ToolCallRecord>>,
}

impl MockGateway {
    /// A gateway with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the reported trace.
    pub fn push_record(&self, record: ToolCallRecord) {
        self.records.lock().unwrap().push(record);
    }
}

#[async_trait]
impl ToolGateway for MockGateway {
    async fn search_tools(
        &self,
        cancel: &CancellationToken,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<ToolSummary>> {
        check(cancel)?;
        Ok(Vec::new())
    }

    async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        check(cancel)?;
        Ok(Vec::new())
    }

    async fn describe_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        _level: DetailLevel,
    ) -> Result<ToolDoc> {
        check(cancel)?;
        Err(Error::invalid_request(format!("unknown tool: {id}")))
    }

    async fn list_tool_examples(
        &self,
        cancel: &CancellationToken,
        _id: &str,
        _max: usize,
    ) -> Result<Vec<ToolExample>> {
        check(cancel)?;
        Ok(Vec::new())
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        id: &str,
        _args: Value,
    ) -> Result<RunOutcome> {
        check(cancel)?;
        self.records.lock().unwrap().push(ToolCallRecord {
            tool_id: id.to_string(),
            backend_kind: "mock".into(),
            duration: Duration::ZERO,
            error_op: None,
        });
        Ok(RunOutcome::default())
    }

    async fn run_chain(
        &self,
        cancel: &CancellationToken,
        steps: &[ChainStep],
    ) -> Result<(RunOutcome, Vec<StepOutcome>)> {
        check(cancel)?;
        let outcomes = steps
            .iter()
            .map(|step| StepOutcome {
                tool_id: step.tool_id.clone(),
                structured: Value::Null,
                error: None,
                backend: "mock".into(),
            })
            .collect();
        Ok((RunOutcome::default(), outcomes))
    }

    fn tracer(&self) -> Option<&dyn ToolCallTracer> {
        Some(self)
    }
}

impl ToolCallTracer for MockGateway {
    fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.records.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.records.lock().unwrap().clear();
    }
}

// =============================================================================
// Mock Backend
// =============================================================================

/// Scripted backend returning a fixed value or a fixed error kind.
pub struct MockBackend {
    kind: BackendKind,
    value: Option<Value>,
    fail_kind: Option<ErrorKind>,
    executions: AtomicUsize,
    last_profile: Mutex<Option<SecurityProfile>>,
}

impl MockBackend {
    /// A backend of the given kind returning an empty success.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            value: None,
            fail_kind: None,
            executions: AtomicUsize::new(0),
            last_profile: Mutex::new(None),
        }
    }

    /// Return the given value on success.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Fail every execution with the given kind.
    pub fn failing_with(mut self, kind: ErrorKind) -> Self {
        self.fail_kind = Some(kind);
        self
    }

    /// Number of executions that reached this backend.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// The profile the most recent request carried.
    pub fn last_profile(&self) -> Option<SecurityProfile> {
        *self.last_profile.lock().unwrap()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        check(cancel)?;
        req.validate()?;
        self.executions.fetch_add(1, Ordering::SeqCst);
        *self.last_profile.lock().unwrap() = req.profile;

        if let Some(kind) = self.fail_kind {
            return Err(Error::new(kind, "scripted failure").with_backend(self.kind));
        }

        Ok(ExecuteResult {
            value: self.value.clone(),
            stdout: String::new(),
            stderr: String::new(),
            tool_calls: Vec::new(),
            duration: Duration::from_millis(1),
            backend: BackendInfo::new(self.kind),
            limits_enforced: LimitsEnforced {
                timeout: true,
                tool_calls: true,
                chain_steps: true,
                ..Default::default()
            },
        })
    }
}

// =============================================================================
// Mock Runtime
// =============================================================================

/// Scripted runtime returning a fixed result or a fixed error kind.
pub struct MockRuntime {
    result: ExecuteResult,
    fail_kind: Option<ErrorKind>,
}

impl MockRuntime {
    /// A runtime returning the given result.
    pub fn new(result: ExecuteResult) -> Self {
        Self {
            result,
            fail_kind: None,
        }
    }

    /// Fail every execution with the given kind.
    pub fn failing_with(kind: ErrorKind) -> Self {
        Self {
            result: ExecuteResult::for_backend(BackendInfo::new(BackendKind::UnsafeHost)),
            fail_kind: Some(kind),
        }
    }
}

#[async_trait]
impl Runtime for MockRuntime {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        check(cancel)?;
        req.validate()?;
        if let Some(kind) = self.fail_kind {
            return Err(Error::new(kind, "scripted failure"));
        }
        Ok(self.result.clone())
    }
}
