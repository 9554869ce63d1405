//! External collaborators of a triage run.
//!
//! - Command executors: [`HttpExecutor`] (remote RPC endpoint), [`ShellExecutor`]
//!   (local `sh -c`) and [`SimulatedExecutor`] (canned data-center replies).
//! - [`Summarizer`]: turns an incident and its run log into a verdict.
//! - [`IncidentSink`]: append-only record of verdicts per incident.

pub mod executors;
pub mod incidents;
pub mod summarize;

#[cfg(test)]
pub(crate) mod test_support;

pub use executors::{HttpExecutor, ShellExecutor, SimulatedExecutor};
pub use incidents::{
    HttpIncidentSink, InMemoryIncidentStore, IncidentRecord, IncidentSink, IncidentUpdate,
    RecordAck,
};
pub use summarize::{build_prompt, OpenAiSummarizer, Summarizer};
