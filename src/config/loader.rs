// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawTrackerConfig, TrackerConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawTrackerConfig`.
///
/// This only performs TOML deserialization; it does **not** validate page
/// bounds or parse durations. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTrackerConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawTrackerConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses durations and checks page bounds and command settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TrackerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = TrackerConfig::try_from(raw_config)?;
    debug!(path = ?path.as_ref(), ?config, "configuration loaded");
    Ok(config)
}

/// Load the config at `path` if given, otherwise fall back to
/// `Cmdtrack.toml` in the working directory when it exists, and to built-in
/// defaults when it does not.
pub fn load_or_default(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let fallback = default_config_path();
            if fallback.is_file() {
                load_and_validate(fallback)
            } else {
                Ok(TrackerConfig::default())
            }
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Cmdtrack.toml")
}
