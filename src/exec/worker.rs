// src/exec/worker.rs

//! Runs an operation for a run entry on its own Tokio task.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::run::{RunEntry, RunOutcome};

use super::operation::{Operation, OperationError, RunContext};

type WorkerResult = Result<i32, OperationError>;

/// Start `operation` for `entry` and return the supervisor's handle.
///
/// The worker task is held back until its `AbortHandle` is installed in the
/// entry's cancel handle, so a forced abort is possible from the moment the
/// run is marked started. The supervisor task awaits the worker and records
/// outcomes the worker could not record itself (panics, forced aborts).
pub fn spawn_worker(entry: Arc<RunEntry>, operation: Box<dyn Operation>) -> JoinHandle<()> {
    let (go_tx, go_rx) = oneshot::channel::<()>();

    let worker_entry = Arc::clone(&entry);
    let worker = tokio::spawn(async move {
        if go_rx.await.is_err() {
            debug!(run_id = %worker_entry.id(), "worker released without go signal");
        }
        run_operation(worker_entry, operation).await
    });

    entry.cancel_handle().install(worker.abort_handle());
    let _ = go_tx.send(());

    tokio::spawn(supervise(entry, worker))
}

async fn run_operation(entry: Arc<RunEntry>, operation: Box<dyn Operation>) -> WorkerResult {
    entry.mark_started();
    info!(run_id = %entry.id(), argv = ?entry.argv(), "run started");

    let ctx = RunContext::new(&entry);
    let result = operation.run(ctx).await;

    // Status line and `finished` are written together under the entry lock.
    entry.finish(RunOutcome::from_result(&result));
    result
}

async fn supervise(entry: Arc<RunEntry>, worker: JoinHandle<WorkerResult>) {
    let run_id = entry.id();

    match worker.await {
        Ok(Ok(code)) => {
            info!(run_id = %run_id, exit_code = code, "run completed");
        }
        Ok(Err(OperationError::Cancelled)) => {
            info!(run_id = %run_id, "run cancelled");
        }
        Ok(Err(OperationError::User(msg))) => {
            warn!(run_id = %run_id, error = %msg, "run failed");
        }
        Ok(Err(OperationError::Fault(err))) => {
            error!(run_id = %run_id, error = ?err, "run faulted");
        }
        Err(join_err) => record_join_error(&entry, join_err),
    }

    entry.cancel_handle().clear();
}

fn record_join_error(entry: &RunEntry, join_err: JoinError) {
    let run_id = entry.id();

    if join_err.is_cancelled() {
        warn!(run_id = %run_id, "run worker was force-aborted");
        entry.finish(RunOutcome::Interrupted);
        return;
    }

    match join_err.try_into_panic() {
        Ok(payload) => {
            let msg = panic_message(payload.as_ref());
            error!(run_id = %run_id, panic = %msg, "run worker panicked");
            entry.finish(RunOutcome::Panicked(msg));
        }
        Err(other) => {
            error!(run_id = %run_id, error = %other, "run worker ended abnormally");
            entry.finish(RunOutcome::Faulted(other.to_string()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
