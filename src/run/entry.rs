// src/run/entry.rs

//! State record for a single tracked run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{LogSettings, SweepPolicy};
use crate::exec::CancelHandle;
use crate::log::{LineCoalescer, LogBuffer, LogError};
use crate::sweeper::{SweepDecision, evaluate};
use crate::types::{OutputStream, RunId};

use super::RunOutcome;

/// A page of a run's log plus its lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLogPage {
    pub items: Vec<String>,
    pub offset: usize,
    pub page_size: usize,
    pub count: usize,
    pub started: bool,
    pub finished: bool,
}

/// Point-in-time copy of the fields the sweeper looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub id: RunId,
    pub last_access: Instant,
    pub started: bool,
    pub finished: bool,
    pub disposed: bool,
    pub line_count: usize,
}

/// Mutable part of a run, all guarded by one lock.
///
/// Log appends, the pending partial lines and the flags share the lock so
/// that readers never see `finished` without the terminal status line.
#[derive(Debug)]
struct RunState {
    last_access: Instant,
    started: bool,
    finished: bool,
    disposed: bool,
    log: LogBuffer,
    pending: [LineCoalescer; 2],
    outcome: Option<RunOutcome>,
}

#[derive(Debug)]
pub struct RunEntry {
    id: RunId,
    argv: Vec<String>,
    created_at: DateTime<Utc>,
    cancel: CancelHandle,
    state: Mutex<RunState>,
    dropped_writes: Arc<AtomicU64>,
}

impl RunEntry {
    pub fn new(argv: Vec<String>, settings: &LogSettings, dropped_writes: Arc<AtomicU64>) -> Self {
        let log = LogBuffer::new(settings.memory_lines, settings.spill_dir.clone(), settings.limits);
        let coalescer = LineCoalescer::new(&settings.newline);

        Self {
            id: RunId::new(),
            argv,
            created_at: Utc::now(),
            cancel: CancelHandle::new(),
            state: Mutex::new(RunState {
                last_access: Instant::now(),
                started: false,
                finished: false,
                disposed: false,
                log,
                pending: [coalescer.clone(), coalescer],
                outcome: None,
            }),
            dropped_writes,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.state.lock().outcome.clone()
    }

    pub fn last_access(&self) -> Instant {
        self.state.lock().last_access
    }

    pub fn touch(&self) {
        self.state.lock().last_access = Instant::now();
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.state.lock();
        RunSnapshot {
            id: self.id,
            last_access: state.last_access,
            started: state.started,
            finished: state.finished,
            disposed: state.disposed,
            line_count: state.log.len(),
        }
    }

    /// Flip `started` once. Returns false if it was already set.
    pub fn mark_started(&self) -> bool {
        let mut state = self.state.lock();
        state.last_access = Instant::now();
        !std::mem::replace(&mut state.started, true)
    }

    /// Feed raw output text; completed lines are appended to the log.
    pub fn write_output(&self, stream: OutputStream, chunk: &str) {
        let mut state = self.state.lock();
        state.last_access = Instant::now();

        // Nothing may follow the status line.
        if state.finished || state.disposed {
            drop(state);
            self.reject(chunk);
            return;
        }

        let mut completed = Vec::new();
        state.pending[stream.index()].feed(chunk, |line| completed.push(line));
        for line in completed {
            self.append_locked(&mut state, line);
        }
    }

    /// Terminate the pending partial line of `stream` with `line`.
    pub fn write_line(&self, stream: OutputStream, line: &str) {
        let mut state = self.state.lock();
        state.last_access = Instant::now();

        if state.finished || state.disposed {
            drop(state);
            self.reject(line);
            return;
        }

        let line = state.pending[stream.index()].complete_with(line);
        self.append_locked(&mut state, line);
    }

    /// Record the terminal outcome.
    ///
    /// Pending partial lines are flushed, the status line is appended and
    /// only then is `finished` set, all in one critical section. Returns
    /// false if the run had already finished (e.g. it was evicted first).
    pub fn finish(&self, outcome: RunOutcome) -> bool {
        let mut state = self.state.lock();
        state.last_access = Instant::now();

        if state.finished {
            let disposed = state.disposed;
            drop(state);
            debug!(run_id = %self.id, %outcome, "run already finished; outcome not recorded");
            if disposed {
                self.reject(&outcome.to_string());
            }
            return false;
        }

        for stream in [OutputStream::Stdout, OutputStream::Stderr] {
            let partial = state.pending[stream.index()].finish();
            if let Some(partial) = partial {
                self.append_locked(&mut state, partial);
            }
        }

        self.append_locked(&mut state, outcome.to_string());
        state.outcome = Some(outcome);
        state.finished = true;
        true
    }

    /// Read a page of the log and the lifecycle flags atomically.
    ///
    /// Touches `last_access`. Fails with [`LogError::Disposed`] once the
    /// sweeper has released the log.
    pub fn read_page(&self, offset: usize, page_size: usize) -> Result<RunLogPage, LogError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(LogError::Disposed);
        }
        state.last_access = Instant::now();

        let page = state.log.page(offset, page_size)?;
        Ok(RunLogPage {
            items: page.items,
            offset: page.offset,
            page_size: page.page_size,
            count: page.count,
            started: state.started,
            finished: state.finished,
        })
    }

    /// Dispose the log if the entry is still idle beyond the policy at `now`.
    ///
    /// The idle check is repeated under the entry lock, so a reader that
    /// touched the entry after the sweeper selected it keeps it alive. A
    /// run that is still going gets an `Evicted` outcome first, keeping
    /// `disposed` implies `finished`.
    pub fn evict_if_idle(&self, now: Instant, policy: &SweepPolicy) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            return false;
        }

        let snapshot = RunSnapshot {
            id: self.id,
            last_access: state.last_access,
            started: state.started,
            finished: state.finished,
            disposed: state.disposed,
            line_count: state.log.len(),
        };
        if !matches!(evaluate(&snapshot, now, policy), SweepDecision::Evict) {
            return false;
        }

        if !state.finished {
            warn!(run_id = %self.id, "evicting run that is still running");
            self.append_locked(&mut state, RunOutcome::Evicted.to_string());
            state.outcome = Some(RunOutcome::Evicted);
            state.finished = true;
        }

        state.disposed = true;
        state.log.dispose();
        true
    }

    fn append_locked(&self, state: &mut RunState, line: String) {
        if let Err(err) = state.log.append(line) {
            match err {
                LogError::Disposed => {
                    self.dropped_writes.fetch_add(1, Ordering::Relaxed);
                    warn!(run_id = %self.id, "attempted to write output after log was closed");
                }
                LogError::Io(e) => {
                    warn!(run_id = %self.id, error = %e, "failed to forward output to log");
                }
            }
        }
    }

    fn reject(&self, text: &str) {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        warn!(
            run_id = %self.id,
            text = %text,
            "attempted to write output after run finished or log was closed"
        );
    }
}
