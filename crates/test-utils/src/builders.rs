#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use cmdtrack::config::{CommandsSection, TrackerConfig};
use cmdtrack::log::PageLimits;

/// Builder for `TrackerConfig` to simplify test setup.
///
/// Starts from the built-in defaults.
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    pub fn page_limits(mut self, min: usize, max: usize) -> Self {
        self.config.log.limits = PageLimits { min, max };
        self
    }

    pub fn memory_lines(mut self, lines: usize) -> Self {
        self.config.log.memory_lines = lines;
        self
    }

    pub fn newline(mut self, newline: &str) -> Self {
        self.config.log.newline = newline.to_string();
        self
    }

    pub fn spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log.spill_dir = Some(dir.into());
        self
    }

    pub fn finished_grace(mut self, dur: Duration) -> Self {
        self.config.sweeper.finished_grace = dur;
        self
    }

    pub fn running_idle(mut self, dur: Duration) -> Self {
        self.config.sweeper.running_idle = dur;
        self
    }

    pub fn poll_interval(mut self, dur: Duration) -> Self {
        self.config.sweeper.poll_interval = dur;
        self
    }

    pub fn abort_grace(mut self, dur: Duration) -> Self {
        self.config.abort_grace = dur;
        self
    }

    pub fn commands(mut self, commands: CommandsSection) -> Self {
        self.config.commands = commands;
        self
    }

    pub fn build(self) -> TrackerConfig {
        self.config
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
