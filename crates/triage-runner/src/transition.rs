//! Transition resolution.
//!
//! After a step's command has run, this module decides where the run goes next:
//! 1. With a pattern: match → `next_on_match`, no match → `next_on_no_match`.
//! 2. Without a pattern: `next_on_match` is the single forward edge.
//!
//! An absent next id ends the run.

use serde::{Deserialize, Serialize};
use triage_guide::Step;
use triage_types::{Result, TriageError};

use crate::expectation::matches;

/// How the next step was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Match,
    NoMatch,
    /// No pattern on the step; the forward edge was taken.
    Forward,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Decision::Match => "match",
            Decision::NoMatch => "no match",
            Decision::Forward => "forward",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub decision: Decision,
    pub next_id: Option<String>,
}

impl Transition {
    /// The run-log line for this decision, e.g. `Decision: match -> next END`.
    pub fn log_line(&self) -> String {
        format!(
            "Decision: {} -> next {}",
            self.decision.as_str(),
            self.next_id.as_deref().unwrap_or("END")
        )
    }
}

/// Resolve the next step for `step` given the command output, if a command ran.
///
/// A pattern on a step without output is tested against the empty string.
pub fn resolve(step: &Step, output: Option<&str>) -> Result<Transition> {
    let Some(ref pattern) = step.expect_pattern else {
        return Ok(Transition {
            decision: Decision::Forward,
            next_id: step.next_on_match.clone(),
        });
    };

    let matched = matches(pattern, output.unwrap_or_default()).map_err(|e| {
        TriageError::InvalidPattern {
            step: step.id.clone(),
            pattern: pattern.clone(),
            message: e.to_string(),
        }
    })?;

    let (decision, next_id) = if matched {
        (Decision::Match, step.next_on_match.clone())
    } else {
        (Decision::NoMatch, step.next_on_no_match.clone())
    };
    Ok(Transition { decision, next_id })
}
