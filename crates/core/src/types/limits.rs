use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Limits
// =============================================================================

/// Resource limits for one execution.
///
/// Zero means "unlimited" for that field. Negative values never validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of tool invocations.
    pub max_tool_calls: i64,
    /// Maximum number of steps in a tool chain.
    pub max_chain_steps: i64,
    /// CPU time budget in milliseconds.
    pub cpu_quota_millis: i64,
    /// Memory budget in bytes.
    pub memory_bytes: i64,
    /// Maximum number of processes/threads.
    pub pids_max: i64,
    /// Disk budget in bytes.
    pub disk_bytes: i64,
}

impl Limits {
    /// Check that all limit values are non-negative.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_tool_calls", self.max_tool_calls),
            ("max_chain_steps", self.max_chain_steps),
            ("cpu_quota_millis", self.cpu_quota_millis),
            ("memory_bytes", self.memory_bytes),
            ("pids_max", self.pids_max),
            ("disk_bytes", self.disk_bytes),
        ];
        for (name, value) in fields {
            if value < 0 {
                return Err(Error::invalid_limits(format!("{name} cannot be negative")));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Limits Enforced
// =============================================================================

/// Reports which limits the backend was actually able to enforce.
///
/// Backends that cannot enforce a given cap must leave that field `false`,
/// even if the caller requested one. Callers rely on this truthful
/// degradation to decide whether to move to a stricter profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsEnforced {
    /// Whether the execution deadline was enforced.
    pub timeout: bool,
    /// Whether the tool call quota was enforced.
    pub tool_calls: bool,
    /// Whether the chain step quota was enforced.
    pub chain_steps: bool,
    /// Whether the memory cap was enforced.
    pub memory: bool,
    /// Whether the CPU cap was enforced.
    pub cpu: bool,
    /// Whether the process cap was enforced.
    pub pids: bool,
    /// Whether the disk cap was enforced.
    pub disk: bool,
}
