//! Expectation matching: a step's pattern against a command's output.
//!
//! Patterns are case-insensitive regular expressions searched anywhere in the
//! output (not anchored). `healthy` matches `STATUS: healthy nodes=12`.

pub use triage_guide::compile;

/// Report whether `pattern` occurs in `text`.
///
/// An invalid pattern is an error, never a silent non-match.
pub fn matches(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    Ok(compile(pattern)?.is_match(text))
}
