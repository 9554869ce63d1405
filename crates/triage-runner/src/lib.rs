//! Runbook execution engine.
//!
//! This crate walks a [`StepGraph`](triage_guide::StepGraph): it runs each
//! step's command through a [`CommandExecutor`], matches the output against
//! the step's expectation, resolves the next step, and stops on a terminal
//! step, an error, the step budget, or cancellation.

pub mod engine;
pub mod events;
pub mod executor;
pub mod expectation;
pub mod transition;

pub use engine::{RunConfig, RunController, RunReport, DEFAULT_MAX_STEPS};
pub use events::{EventEmitter, RunEvent};
pub use executor::{CommandExecutor, ScriptedExecutor};
pub use expectation::{compile, matches};
pub use transition::{resolve, Decision, Transition};
pub use tokio_util::sync::CancellationToken;
