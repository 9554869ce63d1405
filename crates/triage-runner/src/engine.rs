//! Run controller: drives one walk through a step graph.
//!
//! Lifecycle: `Idle → Running → {Completed, Aborted, Exhausted, Cancelled}`,
//! or straight to `Empty` when the guide has no steps.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use triage_guide::StepGraph;
use triage_types::{RunLog, RunStatus, TriageError};

use crate::events::{EventEmitter, RunEvent};
use crate::executor::CommandExecutor;
use crate::transition::resolve;

/// Step budget used when none is configured.
pub const DEFAULT_MAX_STEPS: usize = 100;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Configuration for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of steps a run may execute. Reaching it ends the run as
    /// `Exhausted`, even if the last step resolved to no next step. 0 is treated as 1.
    pub max_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl RunConfig {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self { max_steps }
    }

    fn budget(&self) -> usize {
        self.max_steps.max(1)
    }
}

/// Everything a caller needs after a run, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: uuid::Uuid,
    pub guide_name: String,
    pub status: RunStatus,
    pub steps_executed: usize,
    /// Step ids in execution order.
    pub visited: Vec<String>,
    pub log: Vec<String>,
    /// Error that aborted the run.
    pub failure: Option<String>,
    pub duration_ms: u64,
}

/// Orchestrates runs against one executor. Holds no per-run state, so a
/// single controller can drive any number of runs, concurrently or not.
pub struct RunController {
    executor: Arc<dyn CommandExecutor>,
    config: RunConfig,
    events: EventEmitter,
}

/// Mutable state owned by exactly one run.
struct RunState {
    current_id: String,
    step_count: usize,
    status: RunStatus,
    visited: Vec<String>,
    failure: Option<String>,
}

// ---------------------------------------------------------------------------
// RunController
// ---------------------------------------------------------------------------

impl RunController {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: RunConfig) -> Self {
        Self {
            executor,
            config,
            events: EventEmitter::default(),
        }
    }

    /// Publish run events on `events` instead of a private channel.
    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> RunConfig {
        self.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Run `graph` to a terminal status with a fresh log and no cancellation.
    pub async fn run(&self, graph: &StepGraph) -> RunReport {
        self.run_with_log(graph, RunLog::new(), &CancellationToken::new())
            .await
    }

    /// Run `graph`, appending to `log` as the run progresses. A caller holding
    /// a clone of `log` sees each line as soon as it is written. `cancel` is
    /// checked before every step.
    pub async fn run_with_log(
        &self,
        graph: &StepGraph,
        log: RunLog,
        cancel: &CancellationToken,
    ) -> RunReport {
        let run_id = uuid::Uuid::new_v4();
        let started = Instant::now();

        let Some(entry) = graph.entry_step() else {
            tracing::info!(guide = %graph.name, "Guide has no steps, nothing to run");
            return self
                .finish(run_id, graph, RunStatus::Empty, Vec::new(), None, &log, started)
                .await;
        };

        let mut state = RunState {
            current_id: entry.id.clone(),
            step_count: 0,
            status: RunStatus::Running,
            visited: Vec::new(),
            failure: None,
        };
        let budget = self.config.budget();

        tracing::info!(
            run = %run_id,
            guide = %graph.name,
            steps = graph.len(),
            budget,
            executor = self.executor.name(),
            "Run started"
        );
        self.events.emit(RunEvent::RunStarted {
            run_id: run_id.to_string(),
            guide_name: graph.name.clone(),
            step_count: graph.len(),
        });

        while state.status == RunStatus::Running {
            if cancel.is_cancelled() {
                log.append(format!(
                    "Cancelled: run stopped before step {}",
                    state.current_id
                ))
                .await;
                state.status = RunStatus::Cancelled;
                break;
            }

            // A missing id ends the run like an absent next id would.
            let Some(step) = graph.step(&state.current_id) else {
                tracing::warn!(step = %state.current_id, "Transition to unknown step, ending run");
                state.status = RunStatus::Completed;
                break;
            };

            state.visited.push(step.id.clone());
            log.append(format!("Step {}: {}", step.id, step.description))
                .await;
            tracing::debug!(step = %step.id, "Step started");
            self.events.emit(RunEvent::StepStarted {
                step_id: step.id.clone(),
                description: step.description.clone(),
            });

            let mut output = None;
            if let Some(ref command) = step.command {
                let call_started = Instant::now();
                match self.executor.execute(command).await {
                    Ok(out) => {
                        let duration_ms = call_started.elapsed().as_millis() as u64;
                        tracing::debug!(step = %step.id, command = %command, duration_ms, "Command executed");
                        log.append(format!("$ {command}")).await;
                        log.append(out.clone()).await;
                        self.events.emit(RunEvent::CommandExecuted {
                            step_id: step.id.clone(),
                            command: command.clone(),
                            output_len: out.len(),
                            duration_ms,
                        });
                        output = Some(out);
                    }
                    Err(e) => {
                        self.abort(&mut state, &log, &step.id, e).await;
                        break;
                    }
                }
            }

            let transition = match resolve(step, output.as_deref()) {
                Ok(t) => t,
                Err(e) => {
                    self.abort(&mut state, &log, &step.id, e).await;
                    break;
                }
            };
            log.append(transition.log_line()).await;
            self.events.emit(RunEvent::DecisionMade {
                step_id: step.id.clone(),
                decision: transition.decision,
                next_id: transition.next_id.clone(),
            });

            state.step_count += 1;
            if state.step_count >= budget {
                tracing::warn!(step = %step.id, budget, "Step budget reached");
                state.status = RunStatus::Exhausted;
                break;
            }

            match transition.next_id {
                Some(next) => state.current_id = next,
                None => state.status = RunStatus::Completed,
            }
        }

        self.finish(
            run_id,
            graph,
            state.status,
            state.visited,
            state.failure,
            &log,
            started,
        )
        .await
    }

    async fn abort(&self, state: &mut RunState, log: &RunLog, step_id: &str, err: TriageError) {
        tracing::error!(step = %step_id, error = %err, "Run aborted");
        log.append(format!("Error: {err}")).await;
        state.failure = Some(err.to_string());
        state.status = RunStatus::Aborted;
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        run_id: uuid::Uuid,
        graph: &StepGraph,
        status: RunStatus,
        visited: Vec<String>,
        failure: Option<String>,
        log: &RunLog,
        started: Instant,
    ) -> RunReport {
        let duration_ms = started.elapsed().as_millis() as u64;
        let steps_executed = visited.len();
        tracing::info!(run = %run_id, status = %status, steps_executed, duration_ms, "Run finished");
        self.events.emit(RunEvent::RunFinished {
            run_id: run_id.to_string(),
            status,
            steps_executed,
            duration_ms,
        });
        RunReport {
            run_id,
            guide_name: graph.name.clone(),
            status,
            steps_executed,
            visited,
            log: log.snapshot().await,
            failure,
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
