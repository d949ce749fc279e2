// src/tracker.rs

//! The tracker facade: the operations an outer layer (HTTP handler, CLI)
//! calls to start, read and abort runs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::errors::{Result, TrackerError};
use crate::exec::{OperationLauncher, ProcessLauncher, spawn_worker};
use crate::log::LogError;
use crate::run::{RunEntry, RunLogPage, RunOutcome, RunRegistry};
use crate::types::{AbortOutcome, RunId};

pub struct Tracker {
    registry: Arc<RunRegistry>,
    launcher: Arc<dyn OperationLauncher>,
    abort_grace: Duration,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("registry", &self.registry)
            .field("abort_grace", &self.abort_grace)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig, launcher: impl OperationLauncher + 'static) -> Self {
        Self {
            registry: RunRegistry::new(config.log, config.sweeper),
            launcher: Arc::new(launcher),
            abort_grace: config.abort_grace,
        }
    }

    /// Tracker that runs argv as child processes, per `[commands]`.
    pub fn with_process_launcher(config: TrackerConfig) -> Self {
        let launcher = ProcessLauncher::new(config.commands.clone());
        Self::new(config, launcher)
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Start a run for `argv` and return its identity.
    ///
    /// Input is validated before anything is registered. The operation runs
    /// in the background; this returns as soon as the worker is spawned.
    /// Must be called from within a Tokio runtime.
    pub fn start_run(&self, argv: Vec<String>) -> Result<RunId> {
        match argv.first() {
            None => {
                return Err(TrackerError::InvalidArgument(
                    "no command arguments given".to_string(),
                ));
            }
            Some(first) if first.trim().is_empty() => {
                return Err(TrackerError::InvalidArgument(
                    "command must not be blank".to_string(),
                ));
            }
            Some(_) => {}
        }

        let operation = self.launcher.prepare(&argv)?;

        if let Err(e) = tokio::runtime::Handle::try_current() {
            return Err(TrackerError::Other(anyhow::anyhow!(
                "start_run called outside a tokio runtime: {e}"
            )));
        }

        let entry = self.registry.create(argv);
        let id = entry.id();
        spawn_worker(entry, operation);

        info!(run_id = %id, active_runs = self.registry.len(), "run accepted");
        Ok(id)
    }

    /// Read a page of a run's log.
    ///
    /// `offset` is clamped to `[0, count]` and `page_size` to the configured
    /// page bounds.
    pub fn get_run_log(&self, id: RunId, offset: usize, page_size: usize) -> Result<RunLogPage> {
        let entry = self.lookup(id)?;
        match entry.read_page(offset, page_size) {
            Ok(page) => Ok(page),
            // Swept between lookup and read.
            Err(LogError::Disposed) => Err(TrackerError::RunNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Request cancellation of a run.
    ///
    /// Signals the cooperative token right away. If the worker has not
    /// finished after the abort grace period, its task is force-aborted.
    /// Does not wait for the run to end; callers observe that through
    /// [`Tracker::get_run_log`].
    pub fn abort_run(&self, id: RunId) -> Result<AbortOutcome> {
        let entry = self.lookup(id)?;
        entry.touch();

        if entry.is_finished() {
            debug!(run_id = %id, "abort requested for finished run; nothing to do");
            return Ok(AbortOutcome::AlreadyFinished);
        }

        info!(run_id = %id, "abort requested; signalling cancellation");
        entry.cancel_handle().cancel();
        schedule_forced_abort(entry, self.abort_grace);

        Ok(AbortOutcome::CancellationRequested)
    }

    /// Terminal outcome of a run, once it has finished.
    pub fn run_outcome(&self, id: RunId) -> Result<Option<RunOutcome>> {
        Ok(self.lookup(id)?.outcome())
    }

    /// Parse a caller-supplied run identity.
    pub fn parse_run_id(raw: &str) -> Result<RunId> {
        if raw.trim().is_empty() {
            return Err(TrackerError::InvalidArgument("no run id given".to_string()));
        }
        raw.parse().map_err(TrackerError::InvalidArgument)
    }

    pub fn supported_commands(&self) -> Vec<String> {
        self.launcher.supported_commands()
    }

    pub fn active_runs(&self) -> usize {
        self.registry.len()
    }

    /// Writes rejected because their run had already been swept.
    pub fn dropped_writes(&self) -> u64 {
        self.registry.dropped_writes()
    }

    fn lookup(&self, id: RunId) -> Result<Arc<RunEntry>> {
        match self.registry.get(&id) {
            Some(entry) if !entry.is_disposed() => Ok(entry),
            _ => Err(TrackerError::RunNotFound(id)),
        }
    }
}

/// Force-abort the run's worker if it is still going after `grace`.
fn schedule_forced_abort(entry: Arc<RunEntry>, grace: Duration) {
    let force = |entry: &RunEntry| {
        if entry.is_finished() {
            return;
        }
        if entry.cancel_handle().force_abort() {
            warn!(run_id = %entry.id(), "run ignored cancellation; worker force-aborted");
        } else {
            debug!(run_id = %entry.id(), "no live worker to force-abort");
        }
    };

    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) if !grace.is_zero() => handle,
        _ => {
            force(&entry);
            return;
        }
    };

    handle.spawn(async move {
        tokio::time::sleep(grace).await;
        force(&entry);
    });
}
