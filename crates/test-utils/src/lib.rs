pub mod builders;
pub mod fake_operation;

use std::sync::Once;
use std::time::Duration;

use cmdtrack::Tracker;
use cmdtrack::run::RunLogPage;
use cmdtrack::types::RunId;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll a run's log until it reports `finished`, returning the last page
/// read from offset 0 with the largest allowed page size.
pub async fn wait_until_finished(tracker: &Tracker, id: RunId) -> RunLogPage {
    with_timeout(async {
        loop {
            let page = tracker
                .get_run_log(id, 0, usize::MAX)
                .expect("run should still be registered");
            if page.finished {
                return page;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// Poll until the run reports `started`.
pub async fn wait_until_started(tracker: &Tracker, id: RunId) {
    with_timeout(async {
        loop {
            let page = tracker
                .get_run_log(id, 0, 10)
                .expect("run should still be registered");
            if page.started {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// Read every line of a run's log by paging through it.
pub fn read_all_lines(tracker: &Tracker, id: RunId) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;
    loop {
        let page = tracker
            .get_run_log(id, offset, usize::MAX)
            .expect("run should still be registered");
        if page.items.is_empty() {
            return lines;
        }
        offset = page.offset + page.items.len();
        lines.extend(page.items);
    }
}
