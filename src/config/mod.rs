// src/config/mod.rs

//! Configuration loading and validation for cmdtrack.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate page bounds, durations and command settings (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AbortSection, CommandsSection, LogSection, LogSettings, RawTrackerConfig, SweepPolicy,
    SweeperSection, TrackerConfig,
};
