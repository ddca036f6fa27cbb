use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::traits::ToolGateway;
use crate::types::{Limits, SecurityProfile};

/// Metadata key carrying the explicit opt-in flag for the unsafe backend.
pub const UNSAFE_OPT_IN_KEY: &str = "unsafe_opt_in";

// =============================================================================
// Execute Request
// =============================================================================

/// Parameters for one snippet execution.
///
/// The request is read-only for the runtime and its backends; the gateway
/// handle is shared by reference for the duration of the execution and not
/// beyond.
#[derive(Clone, Default)]
pub struct ExecuteRequest {
    /// Language tag of the code. Empty means the backend's default.
    pub language: String,
    /// The source code to execute. Required.
    pub code: String,
    /// Maximum execution duration. Zero means the backend's default.
    pub timeout: Duration,
    /// Resource limits for the execution.
    pub limits: Limits,
    /// Security profile to use. `None` means the runtime's default.
    pub profile: Option<SecurityProfile>,
    /// The tool gateway exposed to the executed code. Required.
    pub gateway: Option<Arc<dyn ToolGateway>>,
    /// Free-form metadata for backend-specific flags (e.g. opt-in tokens).
    pub metadata: HashMap<String, Value>,
}

impl ExecuteRequest {
    /// Check that the request is valid.
    ///
    /// Validation is total and side-effect free: gateway presence first, then
    /// code, then limits.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.is_none() {
            return Err(Error::missing_gateway());
        }
        if self.code.is_empty() {
            return Err(Error::missing_code());
        }
        self.limits.validate()
    }

    /// Whether the metadata carries the unsafe-backend opt-in flag.
    pub fn has_unsafe_opt_in(&self) -> bool {
        self.metadata
            .get(UNSAFE_OPT_IN_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl fmt::Debug for ExecuteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteRequest")
            .field("language", &self.language)
            .field("code_len", &self.code.len())
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .field("profile", &self.profile)
            .field("gateway", &self.gateway.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}
