//! CLI binary for running and validating triage guides.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use triage_guide::{Severity, StepGraph};
use triage_runner::{CancellationToken, CommandExecutor, RunConfig, RunController, RunReport};
use triage_services::{
    HttpExecutor, HttpIncidentSink, IncidentSink, IncidentUpdate,
    OpenAiSummarizer, ShellExecutor, SimulatedExecutor, Summarizer,
};
use triage_types::{Incident, RunLog, TriageError};

#[derive(Parser)]
#[command(name = "triage", version, about = "Incident triage guide runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guide from a .json file
    Run(RunArgs),

    /// Validate a guide .json file
    Validate {
        /// Path to the guide .json file
        guide: PathBuf,
    },

    /// Show the steps of a guide
    Info {
        /// Path to the guide .json file
        guide: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the guide .json file
    guide: PathBuf,

    /// Maximum number of steps before the run is stopped as exhausted
    #[arg(long, env = "TRIAGE_MAX_STEPS", default_value_t = triage_runner::DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Send commands to this endpoint instead of the built-in simulator
    #[arg(long, env = "TRIAGE_EXECUTOR_URL", conflicts_with = "shell")]
    executor_url: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = 30)]
    executor_timeout_secs: u64,

    /// Run commands in the local shell
    #[arg(long)]
    shell: bool,

    #[arg(long, default_value = "INC-001")]
    incident_id: String,

    #[arg(long, default_value = "New incident")]
    incident_title: String,

    #[arg(long, default_value = "")]
    incident_description: String,

    /// Ask the summarizer (OPENAI_API_KEY) for a final verdict
    #[arg(long)]
    summarize: bool,

    /// Post the verdict as an incident update to --incidents-url
    #[arg(long, requires = "incidents_url")]
    record: bool,

    /// Incident endpoint used by --record
    #[arg(long, env = "TRIAGE_INCIDENTS_URL")]
    incidents_url: Option<String>,

    /// Print the run report as JSON instead of the live log
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn incident(&self) -> Incident {
        Incident {
            id: self.incident_id.clone(),
            title: self.incident_title.clone(),
            description: self.incident_description.clone(),
        }
    }

    fn executor(&self) -> Arc<dyn CommandExecutor> {
        let timeout = Duration::from_secs(self.executor_timeout_secs);
        if self.shell {
            Arc::new(ShellExecutor::new().with_timeout(timeout))
        } else if let Some(ref url) = self.executor_url {
            Arc::new(HttpExecutor::new(url.clone()).with_timeout(timeout))
        } else {
            Arc::new(SimulatedExecutor::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            cmd_run(&args).await?;
        }
        Commands::Validate { guide } => {
            cmd_validate(&guide)?;
        }
        Commands::Info { guide } => {
            cmd_info(&guide)?;
        }
    }

    Ok(())
}

fn log_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn load_guide(path: &Path) -> anyhow::Result<StepGraph> {
    Ok(StepGraph::from_json_file(path)?)
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let graph = load_guide(path)?;
    let diagnostics = triage_guide::validate(&graph);

    if diagnostics.is_empty() {
        println!("Guide is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        has_error |= diag.severity == Severity::Error;
        println!("[{}] {}: {}", diag.severity, diag.rule, diag.message);
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let graph = load_guide(path)?;

    println!("Guide: {}", graph.name);
    println!("Steps: {}", graph.len());
    if let Some(entry) = graph.entry_step() {
        println!("Entry: {}", entry.id);
    }

    println!();
    for step in graph.steps() {
        println!("{}. {}", step.id, step.description);
        if let Some(ref command) = step.command {
            println!("   $ {command}");
        }
        if let Some(ref pattern) = step.expect_pattern {
            println!(
                "   expect: /{}/ | onMatch→{} | onNoMatch→{}",
                pattern,
                step.next_on_match.as_deref().unwrap_or("END"),
                step.next_on_no_match.as_deref().unwrap_or("END"),
            );
        } else {
            println!(
                "   next→{}",
                step.next_on_match.as_deref().unwrap_or("END")
            );
        }
    }
    Ok(())
}

async fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let graph = load_guide(&args.guide)?;
    let executor = args.executor();
    if !args.json {
        println!(
            "Running guide: {} ({} steps, executor: {})",
            graph.name,
            graph.len(),
            executor.name()
        );
    }
    let controller = RunController::new(executor, RunConfig::with_max_steps(args.max_steps));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let log = RunLog::new();
    let done = CancellationToken::new();
    let runner = async {
        let report = controller.run_with_log(&graph, log.clone(), &cancel).await;
        done.cancel();
        report
    };
    let printer = async {
        if args.json {
            return;
        }
        let mut offset = 0;
        loop {
            let finished = done.is_cancelled();
            for line in log.lines_since(offset).await {
                offset += 1;
                println!("{line}");
            }
            if finished {
                break;
            }
            tokio::select! {
                _ = done.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }
    };
    let (report, ()) = tokio::join!(runner, printer);

    let verdict = final_verdict(args, &report).await;

    if args.json {
        let mut value = serde_json::to_value(&report)?;
        value["verdict"] = serde_json::Value::String(verdict.clone());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("\nStatus: {}", report.status);
        println!("Steps executed: {}", report.steps_executed);
        println!("Verdict:\n{verdict}");
    }

    if args.record && report.status.offers_follow_up() {
        record_update(args, &report, verdict).await?;
    }

    if report.failure.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

/// The summarizer's verdict when requested and available, otherwise the
/// status's default text. Summarizer problems never change the run outcome.
async fn final_verdict(args: &RunArgs, report: &RunReport) -> String {
    let fallback = report.status.default_verdict().to_string();
    if !args.summarize || !report.status.offers_follow_up() {
        return fallback;
    }

    let result = match OpenAiSummarizer::from_env() {
        Ok(summarizer) => summarizer.summarize(&args.incident(), &report.log).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(verdict) if !verdict.is_empty() => verdict,
        Ok(_) => fallback,
        Err(e) => {
            let note = summary_skip_note(&e);
            if e.is_configuration() {
                tracing::warn!("{note}");
            } else {
                tracing::error!("{note}");
            }
            if !args.json {
                println!("{note}");
            }
            fallback
        }
    }
}

/// A missing key means the summarizer is not set up; anything else is a failed call.
fn summary_skip_note(err: &TriageError) -> String {
    if err.is_configuration() {
        format!("Summary skipped: {err}")
    } else {
        format!("Summary failed: {err}")
    }
}

async fn record_update(args: &RunArgs, report: &RunReport, verdict: String) -> anyhow::Result<()> {
    let update = IncidentUpdate {
        incident: args.incident(),
        verdict,
        logs: report.log.clone(),
    };
    let Some(ref url) = args.incidents_url else {
        anyhow::bail!("--record needs --incidents-url");
    };
    let ack = HttpIncidentSink::new(url.clone()).record(update).await?;
    if !args.json {
        println!("Incident {} updated ({} records)", args.incident_id, ack.count);
    }
    Ok(())
}
