// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::log::PageLimits;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [log]
/// min_page_size = 10
/// max_page_size = 500
/// memory_lines = 1000
///
/// [sweeper]
/// finished_grace = "5m"
/// running_idle = "1d"
/// poll_interval = "1m"
///
/// [abort]
/// grace = "5s"
///
/// [commands]
/// program = "backup-cli"
/// allowed = ["backup", "restore", "list"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTrackerConfig {
    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub sweeper: SweeperSection,

    #[serde(default)]
    pub abort: AbortSection,

    #[serde(default)]
    pub commands: CommandsSection,
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    /// Smallest page a reader can request; smaller requests are raised.
    #[serde(default = "default_min_page_size")]
    pub min_page_size: usize,

    /// Largest page a reader can request; larger requests are capped.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Lines kept in memory before the log is moved to a temp file.
    #[serde(default = "default_memory_lines")]
    pub memory_lines: usize,

    /// Line terminator recognised in operation output.
    #[serde(default = "default_newline")]
    pub newline: String,

    /// Directory for spill files; the system temp dir when unset.
    #[serde(default)]
    pub spill_dir: Option<PathBuf>,
}

fn default_min_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    500
}

fn default_memory_lines() -> usize {
    1000
}

fn default_newline() -> String {
    "\n".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            min_page_size: default_min_page_size(),
            max_page_size: default_max_page_size(),
            memory_lines: default_memory_lines(),
            newline: default_newline(),
            spill_dir: None,
        }
    }
}

/// `[sweeper]` section. Durations use the `<n><unit>` form (`ms`, `s`, `m`,
/// `h`, `d`).
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperSection {
    /// Idle time after which a finished run is evicted.
    #[serde(default = "default_finished_grace")]
    pub finished_grace: String,

    /// Idle time after which a still-running run is evicted.
    #[serde(default = "default_running_idle")]
    pub running_idle: String,

    /// Delay between sweeps when nothing is eligible.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

fn default_finished_grace() -> String {
    "5m".to_string()
}

fn default_running_idle() -> String {
    "1d".to_string()
}

fn default_poll_interval() -> String {
    "1m".to_string()
}

impl Default for SweeperSection {
    fn default() -> Self {
        Self {
            finished_grace: default_finished_grace(),
            running_idle: default_running_idle(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// `[abort]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AbortSection {
    /// How long a cancelled run may take to wind down before its worker is
    /// force-aborted.
    #[serde(default = "default_abort_grace")]
    pub grace: String,
}

fn default_abort_grace() -> String {
    "5s".to_string()
}

impl Default for AbortSection {
    fn default() -> Self {
        Self {
            grace: default_abort_grace(),
        }
    }
}

/// `[commands]` section, consumed by the process launcher.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct CommandsSection {
    /// Executable every run is started with. When unset, `argv[0]` is the
    /// executable.
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments inserted between `program` and the run's argv.
    #[serde(default)]
    pub prefix_args: Vec<String>,

    /// Permitted first arguments. Empty means anything goes.
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// Validated configuration used by the tracker.
///
/// Only constructed through `TryFrom<RawTrackerConfig>` (see
/// [`crate::config::validate`]) or [`TrackerConfig::default`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub log: LogSettings,
    pub sweeper: SweepPolicy,
    pub abort_grace: Duration,
    pub commands: CommandsSection,
}

/// Log buffer settings applied to every new run.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub limits: PageLimits,
    pub memory_lines: usize,
    pub newline: String,
    pub spill_dir: Option<PathBuf>,
}

/// Idle-time eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub finished_grace: Duration,
    pub running_idle: Duration,
    pub poll_interval: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            finished_grace: Duration::from_secs(5 * 60),
            running_idle: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let log = LogSection::default();
        Self {
            log: LogSettings {
                limits: PageLimits {
                    min: log.min_page_size,
                    max: log.max_page_size,
                },
                memory_lines: log.memory_lines,
                newline: log.newline,
                spill_dir: log.spill_dir,
            },
            sweeper: SweepPolicy::default(),
            abort_grace: Duration::from_secs(5),
            commands: CommandsSection::default(),
        }
    }
}
