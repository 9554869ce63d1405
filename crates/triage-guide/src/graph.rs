use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use triage_types::{Result, TriageError};

use crate::row::{non_blank, GuideRow};

/// Name used when a guide source carries none.
pub const DEFAULT_GUIDE_NAME: &str = "Guide";

#[derive(Debug, Clone)]
pub struct StepGraph {
    pub name: String,
    steps: Vec<Step>,
    /// Maps step id to its position in `steps`. On duplicate ids the later
    /// row wins; both rows stay in `steps`.
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    pub command: Option<String>,
    pub expect_pattern: Option<String>,
    pub next_on_match: Option<String>,
    pub next_on_no_match: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            command: None,
            expect_pattern: None,
            next_on_match: None,
            next_on_no_match: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.expect_pattern = Some(pattern.into());
        self
    }

    pub fn on_match(mut self, next: impl Into<String>) -> Self {
        self.next_on_match = Some(next.into());
        self
    }

    pub fn on_no_match(mut self, next: impl Into<String>) -> Self {
        self.next_on_no_match = Some(next.into());
        self
    }

    /// A step with no command, no pattern and no forward edge ends the run.
    pub fn is_terminal(&self) -> bool {
        self.command.is_none() && self.expect_pattern.is_none() && self.next_on_match.is_none()
    }

    /// Ids this step may transition to.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.next_on_match
            .as_deref()
            .into_iter()
            .chain(self.next_on_no_match.as_deref())
    }

    fn from_row(row: GuideRow, position: usize) -> Self {
        Self {
            id: non_blank(row.id).unwrap_or_else(|| position.to_string()),
            description: non_blank(row.description).unwrap_or_default(),
            command: non_blank(row.command),
            expect_pattern: non_blank(row.expect_pattern),
            next_on_match: non_blank(row.next_on_match),
            next_on_no_match: non_blank(row.next_on_no_match),
        }
    }
}

/// On-disk guide shape: a bare list of rows, or a named object.
#[derive(Deserialize)]
#[serde(untagged)]
enum GuideFile {
    Rows(Vec<GuideRow>),
    Named {
        name: Option<String>,
        steps: Vec<GuideRow>,
    },
}

impl StepGraph {
    /// Build a graph from tabular rows. Rows with a blank id take their
    /// 1-based position as id. Duplicate ids are kept in order; the index
    /// points at the last one.
    pub fn load(name: impl Into<String>, rows: impl IntoIterator<Item = GuideRow>) -> Self {
        let steps = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| Step::from_row(row, i + 1))
            .collect();
        Self::from_steps(name, steps)
    }

    /// Like [`load`](Self::load), but rejects duplicate ids.
    pub fn load_strict(
        name: impl Into<String>,
        rows: impl IntoIterator<Item = GuideRow>,
    ) -> Result<Self> {
        let graph = Self::load(name, rows);
        if let Some(dup) = graph.duplicate_ids().into_iter().next() {
            return Err(TriageError::DuplicateStepId(dup));
        }
        Ok(graph)
    }

    pub fn from_steps(name: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), i).is_some() {
                tracing::debug!(step = %step.id, position = i + 1, "Duplicate step id, later row wins");
            }
        }
        StepGraph {
            name: name.into(),
            steps,
            index,
        }
    }

    /// Parse a JSON guide: either `[row, ...]` or `{"name": ..., "steps": [row, ...]}`.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let file: GuideFile = serde_json::from_str(source)
            .map_err(|e| TriageError::GuideLoad(format!("invalid guide JSON: {e}")))?;
        let (name, rows) = match file {
            GuideFile::Rows(rows) => (None, rows),
            GuideFile::Named { name, steps } => (name, steps),
        };
        let name = non_blank(name).unwrap_or_else(|| DEFAULT_GUIDE_NAME.to_string());
        Ok(Self::load(name, rows))
    }

    /// Read a JSON guide from disk. A guide without a name takes the file stem.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let mut graph = Self::from_json_str(&source)?;
        if graph.name == DEFAULT_GUIDE_NAME {
            if let Some(stem) = path.file_stem() {
                graph.name = stem.to_string_lossy().into_owned();
            }
        }
        Ok(graph)
    }

    /// The first step in sheet order, or `None` for an empty guide.
    pub fn entry_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Ids that occur on more than one row, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashMap::new();
        let mut dups = Vec::new();
        for step in &self.steps {
            let count = seen.entry(step.id.as_str()).or_insert(0usize);
            *count += 1;
            if *count == 2 {
                dups.push(step.id.clone());
            }
        }
        dups
    }
}
