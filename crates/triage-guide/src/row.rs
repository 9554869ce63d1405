//! Tabular guide rows as they arrive from a spreadsheet export.
//!
//! Every column is optional. Cells may be strings, numbers or booleans and are
//! normalized to trimmed strings; blank cells become `None`.

use serde::{Deserialize, Deserializer, Serialize};

/// One row of a guide sheet, prior to id defaulting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuideRow {
    #[serde(deserialize_with = "cell")]
    pub id: Option<String>,
    #[serde(deserialize_with = "cell")]
    pub description: Option<String>,
    #[serde(deserialize_with = "cell")]
    pub command: Option<String>,
    #[serde(deserialize_with = "cell")]
    pub expect_pattern: Option<String>,
    #[serde(deserialize_with = "cell")]
    pub next_on_match: Option<String>,
    #[serde(deserialize_with = "cell")]
    pub next_on_no_match: Option<String>,
}

impl GuideRow {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn expect_pattern(mut self, pattern: impl Into<String>) -> Self {
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
}

/// Normalize a cell value: trim, drop blanks.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

fn cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Cell> = Option::deserialize(deserializer)?;
    let text = raw.map(|c| match c {
        Cell::Text(s) => s,
        Cell::Integer(i) => i.to_string(),
        // Spreadsheets store whole numbers as floats: 2.0 is step "2".
        Cell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Cell::Float(f) => f.to_string(),
        Cell::Boolean(b) => b.to_string(),
    });
    Ok(non_blank(text))
}
