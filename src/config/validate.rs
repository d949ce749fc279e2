// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{LogSettings, RawTrackerConfig, SweepPolicy, TrackerConfig};
use crate::errors::{Result, TrackerError};
use crate::log::PageLimits;

impl TryFrom<RawTrackerConfig> for TrackerConfig {
    type Error = crate::errors::TrackerError;

    fn try_from(raw: RawTrackerConfig) -> std::result::Result<Self, Self::Error> {
        validate_log_section(&raw)?;
        validate_commands_section(&raw)?;

        let sweeper = SweepPolicy {
            finished_grace: positive_duration("sweeper.finished_grace", &raw.sweeper.finished_grace)?,
            running_idle: positive_duration("sweeper.running_idle", &raw.sweeper.running_idle)?,
            poll_interval: positive_duration("sweeper.poll_interval", &raw.sweeper.poll_interval)?,
        };

        if sweeper.running_idle < sweeper.finished_grace {
            return Err(TrackerError::ConfigError(format!(
                "[sweeper].running_idle ({:?}) must not be shorter than finished_grace ({:?})",
                sweeper.running_idle, sweeper.finished_grace
            )));
        }

        // Zero is allowed here: abort forcefully right after signalling.
        let abort_grace = parse_duration(&raw.abort.grace)
            .map_err(|e| TrackerError::ConfigError(format!("[abort].grace: {e}")))?;

        let log = raw.log;
        Ok(TrackerConfig {
            log: LogSettings {
                limits: PageLimits {
                    min: log.min_page_size,
                    max: log.max_page_size,
                },
                memory_lines: log.memory_lines,
                newline: log.newline,
                spill_dir: log.spill_dir,
            },
            sweeper,
            abort_grace,
            commands: raw.commands,
        })
    }
}

fn validate_log_section(cfg: &RawTrackerConfig) -> Result<()> {
    let log = &cfg.log;

    if log.min_page_size == 0 {
        return Err(TrackerError::ConfigError(
            "[log].min_page_size must be >= 1 (got 0)".to_string(),
        ));
    }

    if log.min_page_size > log.max_page_size {
        return Err(TrackerError::ConfigError(format!(
            "[log].min_page_size ({}) must not exceed max_page_size ({})",
            log.min_page_size, log.max_page_size
        )));
    }

    if log.memory_lines == 0 {
        return Err(TrackerError::ConfigError(
            "[log].memory_lines must be >= 1 (got 0)".to_string(),
        ));
    }

    if log.newline.is_empty() {
        return Err(TrackerError::ConfigError(
            "[log].newline must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_commands_section(cfg: &RawTrackerConfig) -> Result<()> {
    if let Some(program) = &cfg.commands.program {
        if program.trim().is_empty() {
            return Err(TrackerError::ConfigError(
                "[commands].program must not be blank when set".to_string(),
            ));
        }
    }

    if cfg.commands.allowed.iter().any(|c| c.trim().is_empty()) {
        return Err(TrackerError::ConfigError(
            "[commands].allowed must not contain blank entries".to_string(),
        ));
    }

    Ok(())
}

fn positive_duration(key: &str, value: &str) -> Result<Duration> {
    let dur = parse_duration(value)
        .map_err(|e| TrackerError::ConfigError(format!("[{key}]: {e}")))?;
    if dur.is_zero() {
        return Err(TrackerError::ConfigError(format!(
            "[{key}] must be greater than zero (got {value:?})"
        )));
    }
    Ok(dur)
}
