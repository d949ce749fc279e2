// src/sweeper/core.rs

//! Pure eviction decision.
//!
//! No Tokio tasks, locks or registry access here: given a snapshot of one
//! run, the current time and the policy, decide whether the run should go.
//! The async loop in [`super::runtime`] applies the decision.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::SweepPolicy;
use crate::run::RunSnapshot;

/// What the sweeper should do with the oldest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    /// Idle longer than its threshold; evict now.
    Evict,
    /// Still within its threshold; `remaining` until it would be evicted.
    Keep { remaining: Duration },
}

/// Idle threshold for a run: short for finished runs (time for a client to
/// pick up the last page), long for runs still in progress.
pub fn idle_threshold(snapshot: &RunSnapshot, policy: &SweepPolicy) -> Duration {
    if snapshot.finished {
        policy.finished_grace
    } else {
        policy.running_idle
    }
}

pub fn evaluate(snapshot: &RunSnapshot, now: Instant, policy: &SweepPolicy) -> SweepDecision {
    let idle = now.saturating_duration_since(snapshot.last_access);
    let threshold = idle_threshold(snapshot, policy);

    if idle > threshold {
        SweepDecision::Evict
    } else {
        SweepDecision::Keep {
            remaining: threshold - idle,
        }
    }
}
