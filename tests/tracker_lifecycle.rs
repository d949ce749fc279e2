// tests/tracker_lifecycle.rs

mod common;
use crate::common::builders::TrackerConfigBuilder;
use crate::common::fake_operation::{ScriptedLauncher, Step};
use crate::common::{init_tracing, read_all_lines, wait_until_finished, wait_until_started};

use std::error::Error;
use std::fmt::Write;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::Duration;

use cmdtrack::Tracker;
use cmdtrack::errors::TrackerError;
use cmdtrack::exec::{Operation, OperationError, OperationLauncher, RunContext, operation_fn};
use cmdtrack::run::RunOutcome;
use cmdtrack::types::{AbortOutcome, RunId};

type TestResult = Result<(), Box<dyn Error>>;

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn tracker(launcher: ScriptedLauncher) -> Tracker {
    let config = TrackerConfigBuilder::new()
        .abort_grace(Duration::from_millis(50))
        .build();
    Tracker::new(config, launcher)
}

#[tokio::test]
async fn test_start_run_completes_with_return_code() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "list",
        vec![
            Step::Line("alpha".into()),
            Step::Line("beta".into()),
            Step::Exit(0),
        ],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["list"]))?;

    // The worker has not been polled yet on this single-threaded runtime.
    let early = tracker.get_run_log(id, 0, 10)?;
    assert!(!early.finished);

    let page = wait_until_finished(&tracker, id).await;
    assert!(page.started);
    assert_eq!(page.items, vec!["alpha", "beta", "Return code: 0"]);
    assert_eq!(page.count, 3);
    assert_eq!(tracker.run_outcome(id)?, Some(RunOutcome::Completed(0)));

    Ok(())
}

#[tokio::test]
async fn test_nonzero_exit_code_is_reported() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script("fail", vec![Step::Exit(3)]);
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["fail"]))?;
    let page = wait_until_finished(&tracker, id).await;

    assert_eq!(page.items.last().map(String::as_str), Some("Return code: 3"));
    let outcome = tracker.run_outcome(id)?.expect("finished run has an outcome");
    assert_eq!(outcome.exit_code(), 3);
    assert!(!outcome.is_success());

    Ok(())
}

#[tokio::test]
async fn test_invalid_argv_creates_no_run() -> TestResult {
    init_tracing();

    let tracker = tracker(ScriptedLauncher::new().with_script("list", vec![]));

    let empty = tracker.start_run(Vec::new()).unwrap_err();
    assert!(matches!(empty, TrackerError::InvalidArgument(_)));
    assert!(empty.is_client_error());

    let unsupported = tracker.start_run(argv(&["frobnicate"])).unwrap_err();
    assert!(matches!(unsupported, TrackerError::InvalidArgument(_)));

    assert_eq!(tracker.active_runs(), 0);
    assert!(!tracker.registry().sweeper_active());

    Ok(())
}

#[tokio::test]
async fn test_unknown_run_id_is_not_found() -> TestResult {
    init_tracing();

    let tracker = tracker(ScriptedLauncher::new());
    let id = RunId::new();

    let read = tracker.get_run_log(id, 0, 10).unwrap_err();
    assert!(matches!(read, TrackerError::RunNotFound(missing) if missing == id));
    assert!(!read.is_client_error());

    let abort = tracker.abort_run(id).unwrap_err();
    assert!(matches!(abort, TrackerError::RunNotFound(_)));

    Ok(())
}

#[test]
fn test_parse_run_id() {
    let id = RunId::new();
    assert_eq!(Tracker::parse_run_id(&id.to_string()).unwrap(), id);

    assert!(matches!(
        Tracker::parse_run_id("not-a-uuid"),
        Err(TrackerError::InvalidArgument(_))
    ));
    assert!(matches!(
        Tracker::parse_run_id("   "),
        Err(TrackerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_abort_after_finish_is_noop() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script("list", vec![Step::Line("done".into())]);
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["list"]))?;
    let before = wait_until_finished(&tracker, id).await;

    assert_eq!(tracker.abort_run(id)?, AbortOutcome::AlreadyFinished);

    let after = tracker.get_run_log(id, 0, 500)?;
    assert_eq!(before.items, after.items);
    assert_eq!(tracker.run_outcome(id)?, Some(RunOutcome::Completed(0)));

    Ok(())
}

#[tokio::test]
async fn test_cooperative_cancellation() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "serve",
        vec![Step::Line("listening".into()), Step::WaitForCancel],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["serve"]))?;
    wait_until_started(&tracker, id).await;

    assert_eq!(tracker.abort_run(id)?, AbortOutcome::CancellationRequested);

    let page = wait_until_finished(&tracker, id).await;
    assert_eq!(page.items, vec!["listening", "Run cancelled"]);
    assert_eq!(tracker.run_outcome(id)?, Some(RunOutcome::Cancelled));

    // A second abort sees the finished run.
    assert_eq!(tracker.abort_run(id)?, AbortOutcome::AlreadyFinished);

    Ok(())
}

#[tokio::test]
async fn test_forced_abort_after_grace() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "stubborn",
        vec![Step::Line("ignoring you".into()), Step::Hang],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["stubborn"]))?;
    wait_until_started(&tracker, id).await;

    assert_eq!(tracker.abort_run(id)?, AbortOutcome::CancellationRequested);

    let page = wait_until_finished(&tracker, id).await;
    assert_eq!(page.items, vec!["ignoring you", "Run interrupted"]);
    assert_eq!(tracker.run_outcome(id)?, Some(RunOutcome::Interrupted));

    let entry = tracker.registry().get(&id).expect("run still registered");
    assert!(!entry.cancel_handle().has_worker());

    Ok(())
}

#[tokio::test]
async fn test_zero_grace_forces_abort_immediately() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script("stubborn", vec![Step::Hang]);
    let config = TrackerConfigBuilder::new().abort_grace(Duration::ZERO).build();
    let tracker = Tracker::new(config, launcher);

    let id = tracker.start_run(argv(&["stubborn"]))?;
    wait_until_started(&tracker, id).await;
    tracker.abort_run(id)?;

    let page = wait_until_finished(&tracker, id).await;
    assert_eq!(page.items.last().map(String::as_str), Some("Run interrupted"));

    Ok(())
}

#[tokio::test]
async fn test_user_error_is_final_log_line() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "deploy",
        vec![
            Step::Line("checking".into()),
            Step::FailUser("target environment is locked".into()),
        ],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["deploy", "prod"]))?;
    let page = wait_until_finished(&tracker, id).await;

    assert_eq!(page.items, vec!["checking", "target environment is locked"]);
    assert_eq!(
        tracker.run_outcome(id)?,
        Some(RunOutcome::Failed("target environment is locked".into()))
    );

    Ok(())
}

#[tokio::test]
async fn test_fault_records_error_chain() -> TestResult {
    init_tracing();

    let launcher =
        ScriptedLauncher::new().with_script("sync", vec![Step::Fault("sync failed".into())]);
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["sync"]))?;
    let page = wait_until_finished(&tracker, id).await;

    let status = page.items.last().expect("status line");
    assert!(status.starts_with("sync failed"), "status was {status:?}");
    assert!(status.contains("inner cause"), "status was {status:?}");
    assert!(matches!(tracker.run_outcome(id)?, Some(RunOutcome::Faulted(_))));

    Ok(())
}

#[tokio::test]
async fn test_panic_is_recorded_as_outcome() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "crash",
        vec![Step::Line("about to crash".into()), Step::Panic("boom".into())],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["crash"]))?;
    let page = wait_until_finished(&tracker, id).await;

    assert_eq!(page.items, vec!["about to crash", "Run panicked: boom"]);
    assert_eq!(tracker.run_outcome(id)?, Some(RunOutcome::Panicked("boom".into())));

    Ok(())
}

#[tokio::test]
async fn test_partial_output_is_flushed_before_status() -> TestResult {
    init_tracing();

    let launcher = ScriptedLauncher::new().with_script(
        "mixed",
        vec![
            Step::Out("abc".into()),
            Step::Err("warn: ".into()),
            Step::Out("def\nghi".into()),
            Step::Err("disk low\n".into()),
            Step::Exit(0),
        ],
    );
    let tracker = tracker(launcher);

    let id = tracker.start_run(argv(&["mixed"]))?;
    let page = wait_until_finished(&tracker, id).await;

    assert_eq!(
        page.items,
        vec!["abcdef", "warn: disk low", "ghi", "Return code: 0"]
    );

    Ok(())
}

#[tokio::test]
async fn test_paging_through_a_long_log() -> TestResult {
    init_tracing();

    let steps: Vec<Step> = (0..1200).map(|i| Step::Line(format!("row {i}"))).collect();
    let launcher = ScriptedLauncher::new().with_script("dump", steps);
    let config = TrackerConfigBuilder::new().memory_lines(100).build();
    let tracker = Tracker::new(config, launcher);

    let id = tracker.start_run(argv(&["dump"]))?;
    let first = wait_until_finished(&tracker, id).await;
    assert_eq!(first.count, 1201);
    assert_eq!(first.items.len(), 500);
    assert_eq!(first.page_size, 500);

    let lines = read_all_lines(&tracker, id);
    assert_eq!(lines.len(), 1201);
    assert_eq!(lines[0], "row 0");
    assert_eq!(lines[1199], "row 1199");
    assert_eq!(lines[1200], "Return code: 0");

    // Offset past the end is clamped to count.
    let past = tracker.get_run_log(id, 5000, 10)?;
    assert_eq!(past.offset, 1201);
    assert!(past.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_runs_are_independent() -> TestResult {
    init_tracing();

    let gate = Arc::new(Notify::new());
    let launcher = ScriptedLauncher::new()
        .with_script("quick", vec![Step::Line("fast".into())])
        .with_script(
            "slow",
            vec![Step::Gate(Arc::clone(&gate)), Step::Line("slow".into())],
        );
    let launched = launcher.launched();
    let tracker = tracker(launcher);

    let slow = tracker.start_run(argv(&["slow", "--verbose"]))?;
    let quick = tracker.start_run(argv(&["quick"]))?;
    assert_ne!(slow, quick);
    assert_eq!(tracker.active_runs(), 2);

    let quick_page = wait_until_finished(&tracker, quick).await;
    assert_eq!(quick_page.items, vec!["fast", "Return code: 0"]);

    let slow_page = tracker.get_run_log(slow, 0, 10)?;
    assert!(!slow_page.finished);

    gate.notify_one();
    let slow_page = wait_until_finished(&tracker, slow).await;
    assert_eq!(slow_page.items, vec!["slow", "Return code: 0"]);

    let launched = launched.lock().unwrap().clone();
    assert_eq!(launched, vec![argv(&["slow", "--verbose"]), argv(&["quick"])]);

    Ok(())
}

#[tokio::test]
async fn test_supported_commands_come_from_launcher() {
    let launcher = ScriptedLauncher::new()
        .with_script("list", vec![])
        .with_script("build", vec![]);
    let tracker = tracker(launcher);

    assert_eq!(tracker.supported_commands(), vec!["build", "list"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_finished_is_never_seen_without_status_line() -> TestResult {
    init_tracing();

    let mut steps = Vec::new();
    for i in 0..200 {
        steps.push(Step::Line(format!("tick {i}")));
        if i % 20 == 0 {
            steps.push(Step::Sleep(Duration::from_millis(1)));
        }
    }
    steps.push(Step::Exit(7));

    let launcher = ScriptedLauncher::new().with_script("ticker", steps);
    let tracker = Arc::new(tracker(launcher));
    let id = tracker.start_run(argv(&["ticker"]))?;

    let mut readers = Vec::new();
    for _ in 0..4 {
        let tracker = Arc::clone(&tracker);
        readers.push(tokio::spawn(async move {
            loop {
                let page = tracker.get_run_log(id, usize::MAX, 10).expect("registered");
                if page.finished {
                    // Nothing is appended after finished, so the tail is stable.
                    let tail = tracker
                        .get_run_log(id, page.count - 1, 10)
                        .expect("registered");
                    assert_eq!(tail.items, vec!["Return code: 7"]);
                    return;
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    for reader in readers {
        tokio::time::timeout(Duration::from_secs(5), reader).await??;
    }

    Ok(())
}

/// Launcher built from closures, echoing argv back through `fmt::Write`.
struct EchoLauncher;

impl OperationLauncher for EchoLauncher {
    fn prepare(&self, argv: &[String]) -> cmdtrack::errors::Result<Box<dyn Operation>> {
        let words = argv[1..].to_vec();
        Ok(operation_fn(move |mut ctx: RunContext| async move {
            for word in &words {
                writeln!(ctx.stdout, "{word}").map_err(|e| OperationError::Fault(e.into()))?;
            }
            write!(ctx.stderr, "{} words", words.len())
                .map_err(|e| OperationError::Fault(e.into()))?;
            Ok::<i32, OperationError>(i32::try_from(words.len()).unwrap_or(i32::MAX))
        }))
    }

    fn supported_commands(&self) -> Vec<String> {
        vec!["echo".to_string()]
    }
}

#[tokio::test]
async fn test_closure_operations_via_fmt_write() -> TestResult {
    init_tracing();

    let tracker = Tracker::new(TrackerConfigBuilder::new().build(), EchoLauncher);
    let id = tracker.start_run(argv(&["echo", "one", "two"]))?;
    let page = wait_until_finished(&tracker, id).await;

    assert_eq!(page.items, vec!["one", "two", "2 words", "Return code: 2"]);
    assert_eq!(tracker.registry().ids(), vec![id]);

    let blank = tracker.start_run(argv(&[" "])).unwrap_err();
    assert!(matches!(blank, TrackerError::InvalidArgument(_)));

    Ok(())
}

/// Launcher whose operation leaves a writer task behind after returning.
struct DetachedWriterLauncher;

impl OperationLauncher for DetachedWriterLauncher {
    fn prepare(&self, _argv: &[String]) -> cmdtrack::errors::Result<Box<dyn Operation>> {
        Ok(operation_fn(|ctx: RunContext| async move {
            ctx.stdout.write_line("before finish");
            let out = ctx.stdout.clone();
            let err = ctx.stderr.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                out.write_line("late line after finish");
                err.write("late partial");
            });
            Ok::<i32, OperationError>(0)
        }))
    }

    fn supported_commands(&self) -> Vec<String> {
        vec!["detach".to_string()]
    }
}

#[tokio::test]
async fn test_writes_after_finish_are_dropped() -> TestResult {
    init_tracing();

    let tracker = Tracker::new(TrackerConfigBuilder::new().build(), DetachedWriterLauncher);
    let id = tracker.start_run(argv(&["detach"]))?;
    wait_until_finished(&tracker, id).await;

    crate::common::with_timeout(async {
        while tracker.dropped_writes() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let page = tracker.get_run_log(id, 0, 500)?;
    assert!(page.finished);
    assert_eq!(page.items, vec!["before finish", "Return code: 0"]);
    assert_eq!(tracker.dropped_writes(), 2);

    Ok(())
}
