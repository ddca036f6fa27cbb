use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Tool Discovery Types
// =============================================================================

/// A short search result describing one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSummary {
    /// Canonical tool identifier (e.g. `"fs:read_file"`).
    pub id: String,
    /// Human-readable tool name.
    pub name: String,
    /// Namespace the tool belongs to.
    pub namespace: String,
    /// One-line description.
    pub short_description: String,
    /// Free-form tags for filtering.
    pub tags: Vec<String>,
}

/// How much documentation to return for a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// Summary and notes only.
    #[default]
    Summary,
    /// Everything the docs store has.
    Full,
}

/// Documentation for one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolDoc {
    /// One-paragraph summary of what the tool does.
    pub summary: String,
    /// Usage notes, caveats, and constraints.
    pub notes: String,
}

/// A usage example for one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolExample {
    /// Example identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// What the example demonstrates.
    pub description: String,
    /// Arguments passed to the tool.
    pub args: Value,
    /// A hint at the shape of the result.
    pub result_hint: String,
}

// =============================================================================
// Tool Execution Types
// =============================================================================

/// The result of running a single tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOutcome {
    /// Structured payload produced by the tool.
    pub structured: Value,
    /// Tag identifying which runner backend executed the tool.
    pub backend: String,
}

/// One step in a tool chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainStep {
    /// Canonical identifier of the tool to run.
    pub tool_id: String,
    /// Arguments for the tool.
    pub args: Value,
    /// Feed the previous step's structured result into this step.
    pub use_previous: bool,
}

/// The result of one executed chain step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOutcome {
    /// Canonical identifier of the tool that ran.
    pub tool_id: String,
    /// Structured payload produced by the step.
    pub structured: Value,
    /// Error message if the step failed.
    pub error: Option<String>,
    /// Tag identifying which runner backend executed the step.
    pub backend: String,
}

impl StepOutcome {
    /// Whether the step completed without error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
