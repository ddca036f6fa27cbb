//! Direct host execution backend.
//!
//! WARNING: this backend provides no isolation. The snippet runs as a child
//! process of the host with the host's filesystem and network. It exists for
//! development only and refuses to run without an explicit opt-in flag in the
//! request metadata.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use sandcell_core::sentinel;
use sandcell_core::{
    Backend, BackendInfo, BackendKind, Error, ErrorKind, ExecuteRequest, ExecuteResult,
    LimitsEnforced, Result,
};

use crate::envelope::{wrap_snippet, SnippetLanguage};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an [`UnsafeHostBackend`].
pub struct UnsafeHostConfig {
    /// Default snippet language when the request carries no tag.
    pub language: SnippetLanguage,
    /// Toolchain argv override. Empty means the language's default command.
    pub command: Vec<String>,
    /// Require `metadata["unsafe_opt_in"] = true` on every request.
    pub require_opt_in: bool,
}

impl Default for UnsafeHostConfig {
    fn default() -> Self {
        Self {
            language: SnippetLanguage::Python,
            command: Vec::new(),
            require_opt_in: true,
        }
    }
}

// =============================================================================
// Unsafe Host Backend
// =============================================================================

/// Executes snippets directly on the host via a toolchain subprocess.
///
/// The snippet is wrapped in a language envelope, written into a scoped
/// temporary workspace (removed on every exit path), and run under the
/// request's deadline composed with the ambient cancellation handle. The
/// child is killed when either fires.
pub struct UnsafeHostBackend {
    language: SnippetLanguage,
    command: Vec<String>,
    require_opt_in: bool,
}

impl UnsafeHostBackend {
    /// Create an unsafe host backend with the given configuration.
    pub fn new(cfg: UnsafeHostConfig) -> Self {
        Self {
            language: cfg.language,
            command: cfg.command,
            require_opt_in: cfg.require_opt_in,
        }
    }

    fn command_for(&self, language: SnippetLanguage) -> Vec<String> {
        if !self.command.is_empty() && language == self.language {
            self.command.clone()
        } else {
            language.default_command()
        }
    }

    fn info(&self, language: SnippetLanguage, program: &str) -> BackendInfo {
        BackendInfo::new(BackendKind::UnsafeHost)
            .with_detail("language", language.as_str())
            .with_detail("command", program)
    }
}

#[async_trait]
impl Backend for UnsafeHostBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::UnsafeHost
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        req: ExecuteRequest,
    ) -> Result<ExecuteResult> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled().with_backend(BackendKind::UnsafeHost));
        }
        req.validate()?;

        if self.require_opt_in && !req.has_unsafe_opt_in() {
            return Err(Error::new(
                ErrorKind::OptInRequired,
                "unsafe backend requires explicit opt-in",
            )
            .with_backend(BackendKind::UnsafeHost));
        }

        let language = SnippetLanguage::resolve(&req.language, self.language)?;
        let command = self.command_for(language);

        tracing::warn!(
            language = language.as_str(),
            code_len = req.code.len(),
            "UNSAFE: executing snippet without isolation"
        );

        let timeout = if req.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            req.timeout
        };

        // Scoped workspace; removed on every exit path when dropped.
        let workspace = tempfile::Builder::new()
            .prefix("sandcell-unsafe-")
            .tempdir()
            .map_err(|e| {
                Error::runtime_unavailable("failed to create scratch workspace")
                    .with_retryable(true)
                    .with_source(e)
                    .with_backend(BackendKind::UnsafeHost)
            })?;

        let snippet_path = workspace.path().join(language.file_name());
        tokio::fs::write(&snippet_path, wrap_snippet(language, &req.code))
            .await
            .map_err(|e| {
                Error::runtime_unavailable("failed to write snippet")
                    .with_retryable(true)
                    .with_source(e)
                    .with_backend(BackendKind::UnsafeHost)
            })?;

        let start = Instant::now();

        let mut cmd = Command::new(&command[0]);
        cmd.args(&command[1..])
            .arg(&snippet_path)
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            Error::runtime_unavailable(format!("failed to spawn toolchain {:?}", command[0]))
                .with_source(e)
                .with_backend(BackendKind::UnsafeHost)
                .with_op("spawn")
        })?;

        // Dropping the output future on either branch kills the child.
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled()
                    .with_backend(BackendKind::UnsafeHost)
                    .with_op("execute"));
            }
            res = tokio::time::timeout(timeout, child.wait_with_output()) => match res {
                Err(_) => {
                    return Err(Error::timeout(format!(
                        "execution exceeded {}ms",
                        timeout.as_millis()
                    ))
                    .with_backend(BackendKind::UnsafeHost));
                }
                Ok(Err(e)) => {
                    return Err(Error::runtime_unavailable("toolchain subprocess failed")
                        .with_source(e)
                        .with_backend(BackendKind::UnsafeHost));
                }
                Ok(Ok(output)) => output,
            },
        };

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let exit_code = output.status.code().unwrap_or(-1);
        let value = if output.status.success() {
            sentinel::extract_value(&stdout)
        } else {
            // Snippet-caused failures surface through the result, not as
            // backend errors; stderr is guaranteed non-empty.
            if stderr.is_empty() {
                stderr = format!("snippet exited with status {exit_code}");
            }
            None
        };

        Ok(ExecuteResult {
            value,
            stdout,
            stderr,
            tool_calls: Vec::new(),
            duration,
            backend: self
                .info(language, &command[0])
                .with_detail("exit_code", exit_code),
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
// Tests
// =============================================================================
