//! Shared types, errors, run status and the run log for the triage runbook engine.
//!
//! This crate provides the foundational types used across all other triage crates:
//! - `TriageError`: unified error taxonomy
//! - `RunStatus`: lifecycle state of a single guide run
//! - `RunLog`: append-only, concurrently readable log of a run
//! - `Incident`: the incident a run is attached to

use serde::{Deserialize, Serialize};

/// Unified error type for all triage subsystems.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    // === Run Errors ===
    #[error("Invalid expectation pattern on step '{step}' ({pattern}): {message}")]
    InvalidPattern {
        step: String,
        pattern: String,
        message: String,
    },

    #[error("Executor failed on '{command}': {message}")]
    ExecutorFailure { command: String, message: String },

    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    // === Guide Errors ===
    #[error("Guide load error: {0}")]
    GuideLoad(String),

    #[error("Duplicate step id '{0}'")]
    DuplicateStepId(String),

    // === Collaborator Errors ===
    #[error("Missing {variable} for {service}")]
    MissingCredentials { service: String, variable: String },

    #[error("Service {service} returned HTTP {status}: {message}")]
    ServiceError {
        service: String,
        status: u16,
        message: String,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TriageError {
    /// Returns `true` if the error comes from missing local configuration
    /// rather than from a failed call. Callers treat these as warnings.
    pub fn is_configuration(&self) -> bool {
        matches!(self, TriageError::MissingCredentials { .. })
    }
}

/// A convenience alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

// ---------------------------------------------------------------------------
// RunStatus: lifecycle of one guide run
// ---------------------------------------------------------------------------

/// State of a run. `Idle` and `Running` are transient; every other variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    /// A step resolved to no next step, or to an id missing from the guide.
    Completed,
    /// A command or expectation failed.
    Aborted,
    /// The step budget was reached.
    Exhausted,
    /// The caller cancelled between steps.
    Cancelled,
    /// The guide had no steps; nothing ran.
    Empty,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Idle | RunStatus::Running)
    }

    /// Whether follow-up actions (AI summary, incident update) make sense for
    /// a run that ended in this state.
    pub fn offers_follow_up(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Aborted | RunStatus::Exhausted
        )
    }

    /// The verdict shown to the operator before any summary is produced.
    pub fn default_verdict(self) -> &'static str {
        match self {
            RunStatus::Completed => "Workflow complete. Review logs and finalize.",
            RunStatus::Aborted => "Workflow aborted due to error.",
            RunStatus::Exhausted => "Workflow stopped at the step limit. Check the guide for loops.",
            RunStatus::Cancelled => "Workflow cancelled.",
            RunStatus::Empty => "Guide has no steps.",
            RunStatus::Idle | RunStatus::Running => "",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
            RunStatus::Exhausted => "exhausted",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Empty => "empty",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RunLog: append-only log with concurrent readers
// ---------------------------------------------------------------------------

use std::sync::Arc;

/// Append-only sequence of log lines owned by one run.
///
/// Cloning a `RunLog` yields another handle to the **same** lines, so a caller
/// can keep a clone and read progress while the run writes. Each line is
/// published whole; readers never observe a partially written entry.
#[derive(Clone, Default)]
pub struct RunLog {
    inner: Arc<tokio::sync::RwLock<Vec<String>>>,
}

impl RunLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub async fn append(&self, line: impl Into<String>) {
        self.inner.write().await.push(line.into());
    }

    /// Copy of all lines written so far.
    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.read().await.clone()
    }

    /// Lines written at or after `offset`. Lets a reader poll for new lines.
    pub async fn lines_since(&self, offset: usize) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.get(offset..).map(<[String]>::to_vec).unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Incident: passed through to collaborators unchanged
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl Default for Incident {
    fn default() -> Self {
        Self {
            id: "INC-001".into(),
            title: "New incident".into(),
            description: String::new(),
        }
    }
}
