//! The sentinel convention for capturing a snippet's final value.
//!
//! Backends wrap the snippet in an envelope that assigns the designated
//! `__out` variable and prints a single marker-framed line on stdout. The
//! runtime side extracts the value from that line. The convention is brittle
//! but portable across language toolchains; backends with a side channel may
//! substitute one as long as the observable behavior is unchanged.

use serde_json::Value;

/// Name of the variable a snippet assigns its final value to.
pub const OUT_VARIABLE: &str = "__out";

/// Prefix of the sentinel-framed payload line on stdout.
pub const OUT_MARKER: &str = "__OUT__:";

/// Extract the captured `__out` value from a snippet's stdout.
///
/// The payload is parsed as JSON; a payload that is not valid JSON is
/// returned as a plain string. Returns `None` when no marker line is present.
pub fn extract_value(stdout: &str) -> Option<Value> {
    for line in stdout.lines() {
        if let Some(payload) = line.strip_prefix(OUT_MARKER) {
            return Some(
                serde_json::from_str(payload)
                    .unwrap_or_else(|_| Value::String(payload.to_string())),
            );
        }
    }
    None
}

/// Remove the sentinel line from stdout, leaving only what the snippet
/// itself printed.
pub fn strip_marker(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !line.starts_with(OUT_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}
