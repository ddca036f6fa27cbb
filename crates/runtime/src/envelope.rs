//! Language envelopes for snippet execution.
//!
//! An envelope wraps the untrusted snippet so that whatever the snippet
//! assigns to the designated `__out` variable is printed as a single
//! sentinel-framed line on stdout, where the backend extracts it.

use sandcell_core::{Error, Result};

/// Snippet language a backend knows how to wrap and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetLanguage {
    /// CPython via `python3`.
    Python,
    /// POSIX shell via `/bin/sh`.
    Shell,
}

impl SnippetLanguage {
    /// Resolve a request's language tag. An empty tag means `fallback`.
    pub fn resolve(tag: &str, fallback: SnippetLanguage) -> Result<SnippetLanguage> {
        match tag {
            "" => Ok(fallback),
            "python" | "python3" | "py" => Ok(SnippetLanguage::Python),
            "shell" | "sh" => Ok(SnippetLanguage::Shell),
            other => Err(Error::invalid_request(format!(
                "unsupported language: {other:?}"
            ))),
        }
    }

    /// The toolchain argv that runs a snippet file of this language.
    pub fn default_command(&self) -> Vec<String> {
        match self {
            SnippetLanguage::Python => vec!["python3".into()],
            SnippetLanguage::Shell => vec!["/bin/sh".into()],
        }
    }

    /// File name for the wrapped snippet in the scratch workspace.
    pub fn file_name(&self) -> &'static str {
        match self {
            SnippetLanguage::Python => "snippet.py",
            SnippetLanguage::Shell => "snippet.sh",
        }
    }

    /// The snake_case tag used in logs and backend details.
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetLanguage::Python => "python",
            SnippetLanguage::Shell => "shell",
        }
    }
}

/// Wrap a snippet so its `__out` value is printed sentinel-framed on stdout.
pub fn wrap_snippet(language: SnippetLanguage, code: &str) -> String {
    match language {
        SnippetLanguage::Python => format!(
            "import json as __json\n\n__out = None\n\n{code}\n\nif __out is not None:\n    print(\"__OUT__:\" + __json.dumps(__out, default=str))\n"
        ),
        SnippetLanguage::Shell => format!(
            "__out=\"\"\n\n{code}\n\nif [ -n \"${{__out}}\" ]; then\n  printf '__OUT__:%s\\n' \"${{__out}}\"\nfi\n"
        ),
    }
}
