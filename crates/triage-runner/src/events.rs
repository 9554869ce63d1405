//! Run event system for progress observers.
//!
//! Emits [`RunEvent`]s via a [`tokio::sync::broadcast`] channel so that a UI,
//! CLI or logger can follow a run without touching the controller. Emission
//! never blocks the run; events with no receiver are dropped.

use serde::{Deserialize, Serialize};
use triage_types::RunStatus;

use crate::transition::Decision;

/// Events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        guide_name: String,
        step_count: usize,
    },
    StepStarted {
        step_id: String,
        description: String,
    },
    CommandExecuted {
        step_id: String,
        command: String,
        output_len: usize,
        duration_ms: u64,
    },
    DecisionMade {
        step_id: String,
        decision: Decision,
        next_id: Option<String>,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        steps_executed: usize,
        duration_ms: u64,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
