//! Expectation pattern compilation.
//!
//! Patterns are case-insensitive regular expressions searched anywhere in the
//! output (not anchored). Lints and runs both compile through [`compile`].

use regex::{Regex, RegexBuilder};

/// Compile a pattern with the matching rules used for every step.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}
