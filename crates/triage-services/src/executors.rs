//! Command executor implementations.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use triage_runner::CommandExecutor;
use triage_types::{Result, TriageError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    output: String,
}

// ---------------------------------------------------------------------------
// HttpExecutor: POST {command} → {output}
// ---------------------------------------------------------------------------

/// Executes commands through a remote endpoint (SDN controller RPC gateway,
/// lab mock, etc.). Non-2xx responses, transport errors and bad bodies are
/// `ExecutorFailure`; an expired timeout is `CommandTimeout`.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request timeout covers the body read, so both phases map here.
    fn transport_error(&self, command: &str, err: reqwest::Error) -> TriageError {
        if err.is_timeout() {
            TriageError::CommandTimeout {
                command: command.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            Self::failure(command, err.to_string())
        }
    }

    fn failure(command: &str, message: impl Into<String>) -> TriageError {
        TriageError::ExecutorFailure {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for HttpExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, command: &str) -> Result<String> {
        tracing::debug!(url = %self.url, command = %command, "Sending command");
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&ExecuteRequest { command })
            .send()
            .await
            .map_err(|e| self.transport_error(command, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(command, e))?;

        if !status.is_success() {
            return Err(Self::failure(command, format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let parsed: ExecuteResponse = serde_json::from_str(&body)
            .map_err(|e| Self::failure(command, format!("Failed to parse response JSON: {e}")))?;
        Ok(parsed.output)
    }
}

// ---------------------------------------------------------------------------
// ShellExecutor: local `sh -c`
// ---------------------------------------------------------------------------

/// Runs commands in a local shell. A non-zero exit code is still output for
/// the pattern to judge; only spawn failures and timeouts are errors.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    workdir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            workdir: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(&self, command: &str) -> Result<String> {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);
        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| TriageError::ExecutorFailure {
            command: command.to_string(),
            message: format!("Failed to spawn command: {e}"),
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TriageError::CommandTimeout {
                command: command.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| TriageError::ExecutorFailure {
                command: command.to_string(),
                message: format!("Command execution failed: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(command = %command, exit_code, stdout_len = stdout.len(), "Shell command completed");

        let mut text = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr.trim_end());
        }
        if exit_code != 0 {
            text.push_str(&format!("\n[exit code {exit_code}]"));
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// SimulatedExecutor: canned data-center replies
// ---------------------------------------------------------------------------

/// Stand-in for a data-center controller, for demos and dry runs.
///
/// Knows `reset api`, `get status` and `check link`; anything else is an
/// `UNKNOWN COMMAND` reply, never an error.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    timestamps: bool,
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self { timestamps: true }
    }
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit timestamps so repeated runs produce identical output.
    pub fn deterministic() -> Self {
        Self { timestamps: false }
    }

    pub fn reply(&self, command: &str) -> String {
        let now = self.timestamps.then(|| {
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        });
        let at = now.as_deref().map(|ts| format!(" @ {ts}")).unwrap_or_default();
        let ts = now.as_deref().map(|ts| format!(" ts={ts}")).unwrap_or_default();
        match command {
            "reset api" => format!("OK: API reset{at}"),
            "get status" => format!("STATUS: healthy nodes=12 unhealthy=0{ts}"),
            "check link" => format!("LINK: controller=sdn-a path=up jitter=3ms loss=0%{ts}"),
            other => format!("UNKNOWN COMMAND '{other}'{at}"),
        }
    }
}

#[async_trait]
impl CommandExecutor for SimulatedExecutor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, command: &str) -> Result<String> {
        Ok(self.reply(command))
    }
}
