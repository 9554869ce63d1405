//! Incident sink: an append-only record of run verdicts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use triage_types::{Incident, Result, TriageError};

/// Id stored when an update arrives without one.
pub const UNKNOWN_INCIDENT_ID: &str = "INC-unknown";

/// Only the tail of a run log is kept per record.
pub const MAX_RECORDED_LOG_LINES: usize = 2000;

/// What a finished run submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentUpdate {
    pub incident: Incident,
    pub verdict: String,
    pub logs: Vec<String>,
}

/// A stored update, stamped on arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub verdict: String,
    pub logs: Vec<String>,
    /// RFC 3339 arrival time.
    pub ts: String,
}

impl IncidentRecord {
    fn from_update(update: IncidentUpdate) -> Self {
        let IncidentUpdate {
            incident,
            verdict,
            mut logs,
        } = update;
        if logs.len() > MAX_RECORDED_LOG_LINES {
            logs.drain(..logs.len() - MAX_RECORDED_LOG_LINES);
        }
        let id = if incident.id.trim().is_empty() {
            UNKNOWN_INCIDENT_ID.to_string()
        } else {
            incident.id
        };
        Self {
            id,
            title: incident.title,
            description: incident.description,
            verdict,
            logs,
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Acknowledgement for a recorded update. `count` is the total number of
/// records held after the append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAck {
    pub ok: bool,
    pub count: usize,
}

#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn record(&self, update: IncidentUpdate) -> Result<RecordAck>;
}

// ---------------------------------------------------------------------------
// InMemoryIncidentStore
// ---------------------------------------------------------------------------

/// Process-local store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIncidentStore {
    records: Arc<RwLock<Vec<IncidentRecord>>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in arrival order.
    pub async fn list(&self) -> Vec<IncidentRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IncidentSink for InMemoryIncidentStore {
    async fn record(&self, update: IncidentUpdate) -> Result<RecordAck> {
        let record = IncidentRecord::from_update(update);
        tracing::info!(incident = %record.id, log_lines = record.logs.len(), "Recording incident update");
        let mut records = self.records.write().await;
        records.push(record);
        Ok(RecordAck {
            ok: true,
            count: records.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// HttpIncidentSink
// ---------------------------------------------------------------------------

/// Posts updates to a remote incident endpoint, which answers with a
/// [`RecordAck`].
#[derive(Debug, Clone)]
pub struct HttpIncidentSink {
    client: reqwest::Client,
    url: String,
}

impl HttpIncidentSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl IncidentSink for HttpIncidentSink {
    async fn record(&self, mut update: IncidentUpdate) -> Result<RecordAck> {
        if update.logs.len() > MAX_RECORDED_LOG_LINES {
            update.logs.drain(..update.logs.len() - MAX_RECORDED_LOG_LINES);
        }
        let resp = self
            .client
            .post(&self.url)
            .json(&update)
            .send()
            .await
            .map_err(|e| TriageError::Other(format!("Incident sink request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TriageError::Other(format!("Incident sink read failed: {e}")))?;
        if !status.is_success() {
            return Err(TriageError::ServiceError {
                service: "incidents".into(),
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
