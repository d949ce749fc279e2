// src/log/mod.rs

//! Line-oriented output storage for a single run.
//!
//! - [`buffer`] owns [`LogBuffer`], the append-only, paginated line store
//!   that keeps small logs in memory and spills large ones to a temp file.
//! - [`lines`] contains [`LineCoalescer`], which turns a raw character
//!   stream into completed lines by matching a terminator incrementally.

pub mod buffer;
pub mod lines;

use thiserror::Error;

pub use buffer::{LogBuffer, LogPage, PageLimits};
pub use lines::LineCoalescer;

#[derive(Error, Debug)]
pub enum LogError {
    /// The buffer has been released by the sweeper.
    #[error("log buffer has been disposed")]
    Disposed,

    #[error("spill file IO error: {0}")]
    Io(#[from] std::io::Error),
}
