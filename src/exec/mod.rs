// src/exec/mod.rs

//! Execution layer.
//!
//! This module runs the opaque operation behind each run and bridges its
//! output and cancellation into the run's entry.
//!
//! - [`operation`] defines the [`Operation`] / [`OperationLauncher`] seam,
//!   plus the [`RunContext`] and [`OutputSink`] handed to operations.
//! - [`worker`] spawns the Tokio task for a run and supervises it.
//! - [`cancel`] holds the two-tier [`CancelHandle`].
//! - [`process`] provides [`ProcessLauncher`], the production launcher that
//!   runs argv as a child process. Tests replace it with scripted
//!   operations.

pub mod cancel;
pub mod operation;
pub mod process;
pub mod worker;

pub use cancel::CancelHandle;
pub use operation::{
    FnOperation, Operation, OperationError, OperationFuture, OperationLauncher, OutputSink,
    RunContext, operation_fn,
};
pub use process::{ProcessLauncher, ProcessOperation};
pub use worker::spawn_worker;
