// src/run/mod.rs

//! Run bookkeeping.
//!
//! - [`entry`] holds [`RunEntry`], the per-run state record (flags,
//!   timestamps, owned log, cancellation handle).
//! - [`registry`] holds [`RunRegistry`], the identity → entry map that also
//!   starts the sweeper on demand.
//! - [`outcome`] describes how a run ended and renders its status line.

pub mod entry;
pub mod outcome;
pub mod registry;

pub use entry::{RunEntry, RunLogPage, RunSnapshot};
pub use outcome::RunOutcome;
pub use registry::RunRegistry;
