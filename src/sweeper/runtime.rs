// src/sweeper/runtime.rs

use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::run::RunRegistry;

use super::core::{SweepDecision, evaluate};

/// Spawn the sweeper loop for `registry` on `handle`.
///
/// Only [`RunRegistry::create`] calls this, with the registry lock held and
/// after flagging the sweeper as active. The returned handle lets the
/// registry tell whether the task is still alive.
pub(crate) fn spawn_sweeper(handle: &Handle, registry: Weak<RunRegistry>) -> AbortHandle {
    handle.spawn(run_sweeper(registry)).abort_handle()
}

/// Evict idle runs until the registry is empty (or dropped).
///
/// Each pass looks only at the run with the oldest `last_access`. If it is
/// idle beyond its threshold it is evicted and the next-oldest is checked
/// straight away; otherwise the loop sleeps for the poll interval.
async fn run_sweeper(registry: Weak<RunRegistry>) {
    info!("sweeper started");

    loop {
        let Some(reg) = registry.upgrade() else {
            debug!("registry dropped; sweeper exiting");
            return;
        };

        if reg.release_sweeper_if_empty() {
            break;
        }

        let policy = *reg.policy();
        let now = Instant::now();

        if let Some(oldest) = reg.oldest() {
            match evaluate(&oldest.snapshot(), now, &policy) {
                SweepDecision::Evict => {
                    if oldest.evict_if_idle(now, &policy) {
                        reg.remove(&oldest.id());
                        info!(
                            run_id = %oldest.id(),
                            created_at = %oldest.created_at(),
                            remaining_runs = reg.len(),
                            "evicted idle run"
                        );
                    }
                    continue;
                }
                SweepDecision::Keep { remaining } => {
                    debug!(
                        run_id = %oldest.id(),
                        ?remaining,
                        "oldest run still within its idle threshold"
                    );
                }
            }
        }

        // Do not keep the registry alive while sleeping.
        drop(reg);
        sleep(policy.poll_interval).await;
    }

    info!("no runs left; sweeper stopped");
}
