use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BackendKind, LimitsEnforced};

// =============================================================================
// Execute Result
// =============================================================================

/// The outcome of one snippet execution.
///
/// Results are caller-owned snapshots; backends may not retain references.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteResult {
    /// Final value of the snippet, captured via the `__out` convention.
    pub value: Option<Value>,
    /// Everything the snippet wrote to stdout.
    pub stdout: String,
    /// Everything the snippet wrote to stderr.
    pub stderr: String,
    /// Ordered record of all tool invocations made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Total execution time.
    pub duration: Duration,
    /// The backend that executed the code.
    pub backend: BackendInfo,
    /// Which limits the backend actually enforced.
    pub limits_enforced: LimitsEnforced,
}

impl ExecuteResult {
    /// An empty result stamped with the given backend info.
    pub fn for_backend(backend: BackendInfo) -> Self {
        Self {
            value: None,
            stdout: String::new(),
            stderr: String::new(),
            tool_calls: Vec::new(),
            duration: Duration::ZERO,
            backend,
            limits_enforced: LimitsEnforced::default(),
        }
    }
}

/// Identifies the backend that executed a snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// The kind of backend.
    pub kind: BackendKind,
    /// Backend-specific detail (image, mode, execution id, ...).
    pub details: HashMap<String, Value>,
}

impl BackendInfo {
    /// Backend info with no details.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            details: HashMap::new(),
        }
    }

    /// Attach one detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Tool Call Records
// =============================================================================

/// One audit entry describing a single tool invocation from inside the
/// sandbox. Appended in call order by the gateway; harvested by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallRecord {
    /// Canonical identifier of the tool that was called.
    pub tool_id: String,
    /// Tag of the runner backend that executed the tool, if reported.
    pub backend_kind: String,
    /// Execution time for this call.
    pub duration: Duration,
    /// The operation that failed, if any (e.g. `"run"`, `"chain"`).
    pub error_op: Option<String>,
}
