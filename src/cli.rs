// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `cmdtrack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdtrack",
    version,
    about = "Run long-lived commands, follow their output and cancel them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Cmdtrack.toml` in the current working directory if present,
    /// built-in defaults otherwise.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CMDTRACK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start a run and follow its output until it finishes.
    ///
    /// Ctrl-C requests cancellation; the run is force-aborted if it does not
    /// stop within the configured abort grace period.
    Run {
        /// Lines fetched per page.
        #[arg(long, default_value_t = 100)]
        page_size: usize,

        /// Delay between log polls (e.g. `250ms`, `1s`).
        #[arg(long, value_name = "DURATION", default_value = "250ms")]
        poll: String,

        /// Command and arguments to run.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },

    /// List the commands accepted by `run`.
    Commands,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
