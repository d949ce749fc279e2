// src/exec/operation.rs

//! The opaque unit of work a run executes, and what it gets to talk to.
//!
//! The tracker never interprets an operation. It only hands it a
//! [`RunContext`] (two output sinks plus a cancellation token) and records
//! the result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::run::RunEntry;
use crate::types::{OutputStream, RunId};

/// Ways an operation can fail.
#[derive(Error, Debug)]
pub enum OperationError {
    /// A failure meant for the user; logged as a single line.
    #[error("{0}")]
    User(String),

    /// The operation observed cooperative cancellation and stopped.
    #[error("operation cancelled")]
    Cancelled,

    /// Anything else; logged with its full error chain and reported to the
    /// worker's supervisor.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

pub type OperationFuture =
    Pin<Box<dyn Future<Output = std::result::Result<i32, OperationError>> + Send + 'static>>;

/// A runnable unit of work.
///
/// `run` consumes the operation and resolves to an exit code.
pub trait Operation: Send {
    fn run(self: Box<Self>, ctx: RunContext) -> OperationFuture;
}

/// Turns a caller's argv into an [`Operation`].
///
/// Production code uses [`crate::exec::ProcessLauncher`]; tests can provide
/// scripted operations instead of spawning processes.
pub trait OperationLauncher: Send + Sync {
    /// Validate `argv` and build the operation. Bad input must be reported as
    /// [`crate::errors::TrackerError::InvalidArgument`]; nothing has been
    /// registered yet at this point.
    fn prepare(&self, argv: &[String]) -> Result<Box<dyn Operation>>;

    /// Commands this launcher accepts as `argv[0]`. Empty means unrestricted.
    fn supported_commands(&self) -> Vec<String>;
}

/// Adapter that makes an async closure an [`Operation`].
pub struct FnOperation<F>(F);

impl<F, Fut> Operation for FnOperation<F>
where
    F: FnOnce(RunContext) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<i32, OperationError>> + Send + 'static,
{
    fn run(self: Box<Self>, ctx: RunContext) -> OperationFuture {
        Box::pin((self.0)(ctx))
    }
}

pub fn operation_fn<F, Fut>(f: F) -> Box<dyn Operation>
where
    F: FnOnce(RunContext) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<i32, OperationError>> + Send + 'static,
{
    Box::new(FnOperation(f))
}

/// Writes one output channel of an operation into its run's log.
///
/// Text is split into lines by the run's line coalescer; partial lines are
/// held until their terminator arrives.
#[derive(Clone)]
pub struct OutputSink {
    entry: Arc<RunEntry>,
    stream: OutputStream,
}

impl OutputSink {
    pub(crate) fn new(entry: Arc<RunEntry>, stream: OutputStream) -> Self {
        Self { entry, stream }
    }

    pub fn stream(&self) -> OutputStream {
        self.stream
    }

    pub fn write(&self, text: &str) {
        self.entry.write_output(self.stream, text);
    }

    /// Write `line` and terminate the current line.
    pub fn write_line(&self, line: &str) {
        self.entry.write_line(self.stream, line);
    }
}

impl fmt::Write for OutputSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("run_id", &self.entry.id())
            .field("stream", &self.stream)
            .finish()
    }
}

/// Everything an operation gets from the tracker.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    run_id: RunId,
    cancel: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(entry: &Arc<RunEntry>) -> Self {
        Self {
            stdout: OutputSink::new(Arc::clone(entry), OutputStream::Stdout),
            stderr: OutputSink::new(Arc::clone(entry), OutputStream::Stderr),
            run_id: entry.id(),
            cancel: entry.cancel_handle().token(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Cooperative cancellation signal for this run.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
