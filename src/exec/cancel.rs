// src/exec/cancel.rs

//! Two-tier cancellation for a run.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Cancellation handle shared by a run entry and its worker.
///
/// 1. **Cooperative**: [`CancelHandle::cancel`] trips a
///    [`CancellationToken`] the operation is expected to watch and honour.
/// 2. **Forced**: [`CancelHandle::force_abort`] aborts the worker's Tokio
///    task. This is best effort and not atomic: the operation future is
///    dropped at its next `.await`, so work in progress (half-written files,
///    an open database transaction) may be left in an undefined state, and
///    code that never yields is not stopped at all. Always try
///    [`CancelHandle::cancel`] first.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the operation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Record the worker task so it can be force-aborted later.
    pub fn install(&self, handle: AbortHandle) {
        *self.abort.lock() = Some(handle);
    }

    /// Forget the worker task once it has ended.
    pub fn clear(&self) {
        self.abort.lock().take();
    }

    pub fn has_worker(&self) -> bool {
        self.abort.lock().is_some()
    }

    /// Abort the worker task. Returns false if no live worker was installed.
    pub fn force_abort(&self) -> bool {
        match self.abort.lock().as_ref() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }
}
