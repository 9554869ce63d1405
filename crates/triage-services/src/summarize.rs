use async_trait::async_trait;
use serde_json::json;

use triage_types::{Incident, Result, TriageError};

/// Number of trailing log lines included in the prompt.
pub const PROMPT_LOG_LINES: usize = 60;

const SYSTEM_PROMPT: &str = "You are a precise SRE assistant.";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Produces a final verdict from an incident and its run log.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, incident: &Incident, logs: &[String]) -> Result<String>;
}

/// Build the user prompt: incident title and description followed by the
/// last [`PROMPT_LOG_LINES`] log lines.
pub fn build_prompt(incident: &Incident, logs: &[String]) -> String {
    let tail = &logs[logs.len().saturating_sub(PROMPT_LOG_LINES)..];
    format!(
        "You are an SRE troubleshooting assistant. Given an incident and execution logs, \
         produce a concise final verdict and suggested next actions. Respond in 4-8 bullet points.\
         \n\nIncident:\n{}\n{}\n\nLogs (last {PROMPT_LOG_LINES} lines):\n{}",
        incident.title,
        incident.description,
        tail.join("\n")
    )
}

// ---------------------------------------------------------------------------
// OpenAiSummarizer
// ---------------------------------------------------------------------------

/// Chat-completions client. Works against OpenAI and any compatible endpoint
/// (Azure OpenAI, local gateways) via [`OpenAiSummarizer::with_base_url`].
#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TriageError::MissingCredentials {
                service: "openai".into(),
                variable: "OPENAI_API_KEY".into(),
            })?;
        let mut summarizer = Self::new(key);
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            summarizer = summarizer.with_base_url(url);
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.trim().is_empty()) {
            summarizer = summarizer.with_model(model);
        }
        Ok(summarizer)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.2,
        })
    }
}

fn provider_error(status: u16, message: impl Into<String>) -> TriageError {
    TriageError::ServiceError {
        service: "openai".into(),
        status,
        message: message.into(),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, incident: &Incident, logs: &[String]) -> Result<String> {
        let body = self.build_request_body(&build_prompt(incident, logs));
        tracing::debug!(model = %self.model, log_lines = logs.len(), "Requesting verdict");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(0, e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| provider_error(0, e.to_string()))?;
        if !status.is_success() {
            return Err(provider_error(status.as_u16(), extract_error_message(&text)));
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            provider_error(status.as_u16(), format!("Failed to parse response JSON: {e}"))
        })?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}
