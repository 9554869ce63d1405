//! End-to-end tests for the run controller.
//!
//! Each test builds a guide from rows, runs it against a scripted executor and
//! checks the terminal status and the run log.

use std::sync::Arc;

use async_trait::async_trait;

use triage_guide::{GuideRow, StepGraph};
use triage_runner::{
    CancellationToken, CommandExecutor, RunConfig, RunController, RunEvent, ScriptedExecutor,
};
use triage_types::{Result, RunLog, RunStatus, TriageError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller(exec: Arc<ScriptedExecutor>, max_steps: usize) -> RunController {
    RunController::new(exec, RunConfig::with_max_steps(max_steps))
}

fn step_lines(log: &[String]) -> usize {
    log.iter().filter(|l| l.starts_with("Step ")).count()
}

// ---------------------------------------------------------------------------
// Scenario A: pattern matches, no next step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn match_without_next_completes() {
    let graph = StepGraph::load(
        "Status",
        vec![GuideRow::new("Check cluster status")
            .id("1")
            .command("get status")
            .expect_pattern("healthy")],
    );
    let exec = Arc::new(
        ScriptedExecutor::new().respond("get status", "STATUS: healthy nodes=12 unhealthy=0"),
    );

    let report = controller(exec.clone(), 100).run(&graph).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.log,
        vec![
            "Step 1: Check cluster status".to_string(),
            "$ get status".to_string(),
            "STATUS: healthy nodes=12 unhealthy=0".to_string(),
            "Decision: match -> next END".to_string(),
        ]
    );
    assert_eq!(exec.calls().await, vec!["get status".to_string()]);
}

// ---------------------------------------------------------------------------
// Scenario B: no match routes to a terminal step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_match_routes_to_terminal_step() {
    let graph = StepGraph::load(
        "Link",
        vec![
            GuideRow::new("Check SDN link")
                .id("1")
                .command("check link")
                .expect_pattern("down")
                .on_no_match("2"),
            GuideRow::new("Link is up, close the incident").id("2"),
        ],
    );
    let exec = Arc::new(ScriptedExecutor::new().respond(
        "check link",
        "LINK: controller=sdn-a path=up jitter=3ms loss=0%",
    ));

    let report = controller(exec, 100).run(&graph).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.steps_executed, 2);
    assert_eq!(report.visited, vec!["1".to_string(), "2".to_string()]);
    assert!(report
        .log
        .contains(&"Decision: no match -> next 2".to_string()));
    assert_eq!(report.log.last().unwrap(), "Decision: forward -> next END");
}

// ---------------------------------------------------------------------------
// Scenario C: two steps pointing at each other exhaust the budget
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_exhausts_budget() {
    let graph = StepGraph::load(
        "Loop",
        vec![
            GuideRow::new("Ping").id("1").on_match("2"),
            GuideRow::new("Pong").id("2").on_match("1"),
        ],
    );

    let report = controller(Arc::new(ScriptedExecutor::new()), 5).run(&graph).await;

    assert_eq!(report.status, RunStatus::Exhausted);
    assert_eq!(report.steps_executed, 5);
    assert_eq!(step_lines(&report.log), 5);
    assert_eq!(report.visited, vec!["1", "2", "1", "2", "1"]);
}

#[tokio::test]
async fn cycle_with_commands_exhausts_default_budget() {
    let graph = StepGraph::load(
        "Retry forever",
        vec![GuideRow::new("Reset until healthy")
            .id("1")
            .command("reset api")
            .expect_pattern("healthy")
            .on_no_match("1")],
    );
    let exec = Arc::new(ScriptedExecutor::new().respond("reset api", "OK: API reset"));

    let report = RunController::new(exec.clone(), RunConfig::default())
        .run(&graph)
        .await;

    assert_eq!(report.status, RunStatus::Exhausted);
    assert_eq!(report.steps_executed, 100);
    assert_eq!(exec.calls().await.len(), 100);
}

// ---------------------------------------------------------------------------
// Scenario D: executor failure mid-run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_failure_aborts_with_partial_log() {
    let graph = StepGraph::load(
        "Outage",
        vec![
            GuideRow::new("Check status")
                .id("1")
                .command("get status")
                .expect_pattern("unhealthy=[1-9]")
                .on_no_match("2"),
            GuideRow::new("Check link").id("2").command("check link").on_match("3"),
            GuideRow::new("Reset API").id("3").command("reset api"),
        ],
    );
    let exec = Arc::new(
        ScriptedExecutor::new()
            .respond("get status", "STATUS: healthy nodes=12 unhealthy=0")
            .fail("check link", "503 Service Unavailable")
            .respond("reset api", "OK"),
    );

    let report = controller(exec.clone(), 100).run(&graph).await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.visited, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(
        report.log,
        vec![
            "Step 1: Check status".to_string(),
            "$ get status".to_string(),
            "STATUS: healthy nodes=12 unhealthy=0".to_string(),
            "Decision: no match -> next 2".to_string(),
            "Step 2: Check link".to_string(),
            "Error: Executor failed on 'check link': 503 Service Unavailable".to_string(),
        ]
    );
    assert!(report.failure.unwrap().contains("503"));
    // Step 3 never ran.
    assert_eq!(
        exec.calls().await,
        vec!["get status".to_string(), "check link".to_string()]
    );
}

#[tokio::test]
async fn timeout_is_handled_like_any_executor_failure() {
    struct SlowExecutor;

    #[async_trait]
    impl CommandExecutor for SlowExecutor {
        fn name(&self) -> &str {
            "slow"
        }
        async fn execute(&self, command: &str) -> Result<String> {
            Err(TriageError::CommandTimeout {
                command: command.to_string(),
                timeout_ms: 30_000,
            })
        }
    }

    let graph = StepGraph::load(
        "G",
        vec![GuideRow::new("Check").command("get status").on_match("2"), GuideRow::new("Next")],
    );
    let report = RunController::new(Arc::new(SlowExecutor), RunConfig::default())
        .run(&graph)
        .await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(
        report.log.last().unwrap(),
        "Error: Command 'get status' timed out after 30000ms"
    );
    assert_eq!(report.steps_executed, 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn match_and_no_match_pick_their_edges() {
    let rows = |output: &str| {
        (
            StepGraph::load(
                "G",
                vec![
                    GuideRow::new("Check").id("1").command("get status").expect_pattern("HEALTHY").on_match("ok").on_no_match("bad"),
                    GuideRow::new("Healthy").id("ok"),
                    GuideRow::new("Unhealthy").id("bad"),
                ],
            ),
            Arc::new(ScriptedExecutor::new().respond("get status", output)),
        )
    };

    let (graph, exec) = rows("STATUS: healthy nodes=12");
    let report = controller(exec, 10).run(&graph).await;
    assert_eq!(report.visited, vec!["1".to_string(), "ok".to_string()]);

    let (graph, exec) = rows("STATUS: degraded");
    let report = controller(exec, 10).run(&graph).await;
    assert_eq!(report.visited, vec!["1".to_string(), "bad".to_string()]);
}

#[tokio::test]
async fn dangling_reference_completes_not_aborts() {
    let graph = StepGraph::load(
        "G",
        vec![GuideRow::new("Check").id("1").command("get status").expect_pattern("healthy").on_match("99")],
    );
    let exec = Arc::new(ScriptedExecutor::new().respond("get status", "healthy"));

    let report = controller(exec, 10).run(&graph).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.log.last().unwrap(), "Decision: match -> next 99");
    assert!(report.failure.is_none());
}

#[tokio::test]
async fn duplicated_entry_id_starts_at_later_row() {
    let graph = StepGraph::load(
        "G",
        vec![
            GuideRow::new("first").id("a").command("first cmd"),
            GuideRow::new("second").id("a").command("second cmd"),
        ],
    );
    let exec = Arc::new(
        ScriptedExecutor::new()
            .respond("first cmd", "one")
            .respond("second cmd", "two"),
    );

    // The entry is the first row, but its id resolves through the index.
    assert_eq!(graph.entry_step().unwrap().description, "first");
    let report = controller(exec.clone(), 10).run(&graph).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.log,
        vec![
            "Step a: second".to_string(),
            "$ second cmd".to_string(),
            "two".to_string(),
            "Decision: forward -> next END".to_string(),
        ]
    );
    assert_eq!(exec.calls().await, vec!["second cmd".to_string()]);
}

#[tokio::test]
async fn runs_are_idempotent_with_deterministic_executor() {
    let graph = StepGraph::load(
        "G",
        vec![
            GuideRow::new("Check").id("1").command("get status").expect_pattern("healthy").on_match("2").on_no_match("3"),
            GuideRow::new("Link").id("2").command("check link").on_match("1"),
            GuideRow::new("Reset").id("3"),
        ],
    );
    let exec = Arc::new(
        ScriptedExecutor::new()
            .respond("get status", "STATUS: healthy")
            .respond("check link", "LINK: up"),
    );
    let ctl = controller(exec, 7);

    let first = ctl.run(&graph).await;
    let second = ctl.run(&graph).await;

    assert_eq!(first.status, second.status);
    assert_eq!(first.log, second.log);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn every_run_terminates_within_budget() {
    let graphs = vec![
        StepGraph::load("self loop", vec![GuideRow::new("a").id("1").on_match("1")]),
        StepGraph::load(
            "three cycle",
            vec![
                GuideRow::new("a").id("1").on_match("2"),
                GuideRow::new("b").id("2").on_match("3"),
                GuideRow::new("c").id("3").on_match("1"),
            ],
        ),
        StepGraph::load("linear", vec![GuideRow::new("a").on_match("2"), GuideRow::new("b")]),
    ];
    for budget in [1, 2, 3, 10] {
        for graph in &graphs {
            let report = controller(Arc::new(ScriptedExecutor::new()), budget)
                .run(graph)
                .await;
            assert!(report.status.is_terminal());
            assert!(
                report.steps_executed <= budget,
                "{} ran {} steps with budget {}",
                graph.name,
                report.steps_executed,
                budget
            );
        }
    }
}

#[tokio::test]
async fn shared_graph_supports_concurrent_runs() {
    let graph = Arc::new(StepGraph::load(
        "Shared",
        vec![
            GuideRow::new("Check").id("1").command("get status").expect_pattern("healthy").on_match("2"),
            GuideRow::new("Done").id("2"),
        ],
    ));
    let exec = Arc::new(ScriptedExecutor::new().respond("get status", "healthy"));
    let ctl = Arc::new(controller(exec, 10));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let graph = graph.clone();
        let ctl = ctl.clone();
        handles.push(tokio::spawn(async move { ctl.run(&graph).await }));
    }
    for handle in handles {
        let report = handle.await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.log.len(), 6);
    }
}

// ---------------------------------------------------------------------------
// Cancellation and live log
// ---------------------------------------------------------------------------

/// Executor that cancels the run once it has been called `after` times.
struct CancellingExecutor {
    cancel: CancellationToken,
    after: usize,
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl CommandExecutor for CancellingExecutor {
    fn name(&self) -> &str {
        "cancelling"
    }
    async fn execute(&self, _command: &str) -> Result<String> {
        let n = self
            .calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;
        if n >= self.after {
            self.cancel.cancel();
        }
        Ok("ok".into())
    }
}

#[tokio::test]
async fn cancellation_between_steps_keeps_log() {
    let cancel = CancellationToken::new();
    let exec = Arc::new(CancellingExecutor {
        cancel: cancel.clone(),
        after: 2,
        calls: Default::default(),
    });
    let graph = StepGraph::load(
        "G",
        vec![
            GuideRow::new("one").id("1").command("a").on_match("2"),
            GuideRow::new("two").id("2").command("b").on_match("3"),
            GuideRow::new("three").id("3").command("c"),
        ],
    );

    let report = RunController::new(exec, RunConfig::default())
        .run_with_log(&graph, RunLog::new(), &cancel)
        .await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.visited, vec!["1".to_string(), "2".to_string()]);
    assert_eq!(step_lines(&report.log), 2);
    assert_eq!(
        report.log.last().unwrap(),
        "Cancelled: run stopped before step 3"
    );
}

#[tokio::test]
async fn caller_observes_log_while_running() {
    let graph = StepGraph::load(
        "G",
        vec![
            GuideRow::new("one").id("1").command("get status").on_match("2"),
            GuideRow::new("two").id("2"),
        ],
    );
    let exec = Arc::new(ScriptedExecutor::new().respond("get status", "healthy"));
    let ctl = controller(exec, 10);
    let mut rx = ctl.events().subscribe();
    let log = RunLog::new();
    let observer = log.clone();

    let report = ctl
        .run_with_log(&graph, log, &CancellationToken::new())
        .await;

    // The observer's handle holds exactly what the report returned.
    assert_eq!(observer.snapshot().await, report.log);

    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        if let RunEvent::RunFinished { status, steps_executed, .. } = event {
            finished = Some((status, steps_executed));
        }
    }
    assert_eq!(finished, Some((RunStatus::Completed, 2)));
}

#[tokio::test]
async fn empty_guide_is_a_no_op() {
    let exec = Arc::new(ScriptedExecutor::new());
    let report = controller(exec.clone(), 10)
        .run(&StepGraph::load("Empty", Vec::new()))
        .await;
    assert_eq!(report.status, RunStatus::Empty);
    assert!(report.log.is_empty());
    assert!(exec.calls().await.is_empty());
}
