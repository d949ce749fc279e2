// tests/sweep_decision.rs

use std::time::Duration;

use tokio::time::Instant;

use cmdtrack::config::SweepPolicy;
use cmdtrack::run::RunSnapshot;
use cmdtrack::sweeper::{SweepDecision, evaluate, idle_threshold};
use cmdtrack::types::RunId;

fn policy() -> SweepPolicy {
    SweepPolicy {
        finished_grace: Duration::from_secs(300),
        running_idle: Duration::from_secs(86_400),
        poll_interval: Duration::from_secs(60),
    }
}

fn snapshot(last_access: Instant, finished: bool) -> RunSnapshot {
    RunSnapshot {
        id: RunId::new(),
        last_access,
        started: true,
        finished,
        disposed: false,
        line_count: 3,
    }
}

#[test]
fn test_threshold_depends_on_finished() {
    let now = Instant::now();
    assert_eq!(idle_threshold(&snapshot(now, true), &policy()), Duration::from_secs(300));
    assert_eq!(idle_threshold(&snapshot(now, false), &policy()), Duration::from_secs(86_400));
}

#[test]
fn test_finished_run_kept_within_grace() {
    let start = Instant::now();
    let now = start + Duration::from_secs(200);

    assert_eq!(
        evaluate(&snapshot(start, true), now, &policy()),
        SweepDecision::Keep { remaining: Duration::from_secs(100) }
    );
}

#[test]
fn test_idle_equal_to_threshold_is_kept() {
    let start = Instant::now();
    let now = start + Duration::from_secs(300);

    assert_eq!(
        evaluate(&snapshot(start, true), now, &policy()),
        SweepDecision::Keep { remaining: Duration::ZERO }
    );
}

#[test]
fn test_finished_run_evicted_after_grace() {
    let start = Instant::now();
    let now = start + Duration::from_secs(301);

    assert_eq!(evaluate(&snapshot(start, true), now, &policy()), SweepDecision::Evict);
}

#[test]
fn test_running_run_uses_running_threshold() {
    let start = Instant::now();

    let hour_later = start + Duration::from_secs(3600);
    assert!(matches!(
        evaluate(&snapshot(start, false), hour_later, &policy()),
        SweepDecision::Keep { .. }
    ));

    let day_later = start + Duration::from_secs(86_401);
    assert_eq!(
        evaluate(&snapshot(start, false), day_later, &policy()),
        SweepDecision::Evict
    );
}

#[test]
fn test_access_after_now_counts_as_fresh() {
    let now = Instant::now();
    let later = now + Duration::from_secs(10);

    assert_eq!(
        evaluate(&snapshot(later, true), now, &policy()),
        SweepDecision::Keep { remaining: Duration::from_secs(300) }
    );
}
