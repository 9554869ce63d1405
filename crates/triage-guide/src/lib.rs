//! Step graph model for triage runbooks.
//!
//! A guide is an ordered list of [`Step`]s addressed by id. Guides arrive as
//! tabular rows ([`GuideRow`]), usually exported from a spreadsheet, and are
//! turned into an immutable [`StepGraph`] that any number of runs may share.
//!
//! # Example
//! ```
//! use triage_guide::{GuideRow, StepGraph};
//!
//! let rows = vec![
//!     GuideRow::new("Check status").command("get status").expect_pattern("healthy"),
//! ];
//! let graph = StepGraph::load("Outage", rows);
//! assert_eq!(graph.entry_step().unwrap().id, "1");
//! ```

pub mod graph;
pub mod pattern;
pub mod row;
pub mod validation;

pub use graph::{Step, StepGraph};
pub use pattern::compile;
pub use row::GuideRow;
pub use validation::{validate, Diagnostic, LintRule, Severity};
