// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::log::LogError;
use crate::types::RunId;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// Malformed or missing client input. No run state is created.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The run was never created or has already been swept.
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Log buffer error: {0}")]
    LogError(#[from] LogError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// True for errors caused by the caller's input rather than tracker state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TrackerError::InvalidArgument(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TrackerError>;
