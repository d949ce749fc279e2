// src/sweeper/mod.rs

//! Idle-time reclamation of runs.
//!
//! The decision logic lives in [`core`] and is a pure function; the
//! background loop in [`runtime`] is started by the registry on the first
//! run and exits once the registry is empty.

pub mod core;
pub mod runtime;

pub use self::core::{SweepDecision, evaluate, idle_threshold};
pub(crate) use runtime::spawn_sweeper;
