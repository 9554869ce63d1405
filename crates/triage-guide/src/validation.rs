//! Guide lints: advisory diagnostics over a [`StepGraph`].
//!
//! Nothing here rejects a guide. Runs tolerate dangling references and
//! duplicate ids by design, so these rules only tell the author what will
//! happen at run time. Cycles are not checked; the run's step budget bounds them.

use std::collections::{HashSet, VecDeque};

use crate::graph::StepGraph;
use crate::pattern::compile;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub step_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        })
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic>;
}

fn diag(rule: &dyn LintRule, severity: Severity, step: Option<&str>, message: String) -> Diagnostic {
    Diagnostic {
        rule: rule.name().into(),
        severity,
        message,
        step_id: step.map(String::from),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct DuplicateIdRule;
impl LintRule for DuplicateIdRule {
    fn name(&self) -> &str { "duplicate_id" }
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic> {
        graph
            .duplicate_ids()
            .into_iter()
            .map(|id| {
                diag(
                    self,
                    Severity::Warning,
                    Some(&id),
                    format!("Step id '{id}' appears on several rows; transitions reach only the last one"),
                )
            })
            .collect()
    }
}

struct DanglingTransitionRule;
impl LintRule for DanglingTransitionRule {
    fn name(&self) -> &str { "dangling_transition" }
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for step in graph.steps() {
            for target in step.targets() {
                if !graph.contains(target) {
                    out.push(diag(
                        self,
                        Severity::Warning,
                        Some(&step.id),
                        format!(
                            "Step '{}' points to missing step '{}'; the run will end there",
                            step.id, target
                        ),
                    ));
                }
            }
        }
        out
    }
}

struct InvalidPatternRule;
impl LintRule for InvalidPatternRule {
    fn name(&self) -> &str { "invalid_pattern" }
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic> {
        graph
            .steps()
            .iter()
            .filter_map(|step| {
                let pattern = step.expect_pattern.as_deref()?;
                let err = compile(pattern).err()?;
                Some(diag(
                    self,
                    Severity::Error,
                    Some(&step.id),
                    format!("Step '{}' has an invalid pattern '{}': {}", step.id, pattern, err),
                ))
            })
            .collect()
    }
}

struct UnreachableStepRule;
impl LintRule for UnreachableStepRule {
    fn name(&self) -> &str { "unreachable_step" }
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic> {
        let Some(entry) = graph.entry_step() else {
            return vec![];
        };
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(entry.id.as_str());
        queue.push_back(entry);
        while let Some(step) = queue.pop_front() {
            for target in step.targets() {
                if let Some(next) = graph.step(target) {
                    if visited.insert(next.id.as_str()) {
                        queue.push_back(next);
                    }
                }
            }
        }
        graph
            .steps()
            .iter()
            .filter(|s| !visited.contains(s.id.as_str()))
            .map(|s| {
                diag(
                    self,
                    Severity::Info,
                    Some(&s.id),
                    format!("Step '{}' cannot be reached from the entry step", s.id),
                )
            })
            .collect()
    }
}

struct PatternWithoutCommandRule;
impl LintRule for PatternWithoutCommandRule {
    fn name(&self) -> &str { "pattern_without_command" }
    fn apply(&self, graph: &StepGraph) -> Vec<Diagnostic> {
        graph
            .steps()
            .iter()
            .filter(|s| s.expect_pattern.is_some() && s.command.is_none())
            .map(|s| {
                diag(
                    self,
                    Severity::Info,
                    Some(&s.id),
                    format!("Step '{}' has a pattern but no command; it is tested against empty output", s.id),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn builtin_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(DuplicateIdRule),
        Box::new(DanglingTransitionRule),
        Box::new(InvalidPatternRule),
        Box::new(UnreachableStepRule),
        Box::new(PatternWithoutCommandRule),
    ]
}

/// Run all built-in rules and return every diagnostic.
pub fn validate(graph: &StepGraph) -> Vec<Diagnostic> {
    builtin_rules()
        .iter()
        .flat_map(|rule| rule.apply(graph))
        .collect()
}
