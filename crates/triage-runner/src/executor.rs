//! Command executor trait and a scripted implementation.
//!
//! The run controller hands each step's command to a [`CommandExecutor`] and
//! waits for the whole output. Transport, timeouts and the actual target
//! (SDN controller RPC, local shell, HTTP service) belong to the implementation;
//! any failure comes back as an error and aborts the run.

use std::collections::HashMap;

use async_trait::async_trait;

use triage_types::{Result, TriageError};

// ---------------------------------------------------------------------------
// CommandExecutor trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Short name for logs (e.g. "http", "shell", "scripted").
    fn name(&self) -> &str;

    /// Run one command and return its complete textual output.
    async fn execute(&self, command: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// ScriptedExecutor: canned responses, records every call
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure(String),
}

/// Deterministic executor returning canned output per command.
///
/// Commands without a scripted reply fail with `ExecutorFailure`, unless a
/// fallback output is set.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: HashMap<String, Reply>,
    fallback: Option<String>,
    calls: tokio::sync::Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `command` with `output`.
    pub fn respond(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.replies.insert(command.into(), Reply::Output(output.into()));
        self
    }

    /// Fail `command` with a transport error carrying `message`.
    pub fn fail(mut self, command: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies.insert(command.into(), Reply::Failure(message.into()));
        self
    }

    /// Output for commands that have no scripted reply.
    pub fn fallback(mut self, output: impl Into<String>) -> Self {
        self.fallback = Some(output.into());
        self
    }

    /// Commands executed so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, command: &str) -> Result<String> {
        self.calls.lock().await.push(command.to_string());
        match (self.replies.get(command), &self.fallback) {
            (Some(Reply::Output(out)), _) => Ok(out.clone()),
            (Some(Reply::Failure(msg)), _) => Err(TriageError::ExecutorFailure {
                command: command.to_string(),
                message: msg.clone(),
            }),
            (None, Some(out)) => Ok(out.clone()),
            (None, None) => Err(TriageError::ExecutorFailure {
                command: command.to_string(),
                message: "no scripted reply".into(),
            }),
        }
    }
}
