// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod log;
pub mod logging;
pub mod run;
pub mod sweeper;
pub mod tracker;
pub mod types;

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{TrackerConfig, load_or_default, parse_duration};
use crate::types::RunId;

pub use crate::tracker::Tracker;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - the tracker with a process launcher
/// - following a run's log page by page
/// - Ctrl-C → abort
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Commands => {
            print_supported_commands(&config);
            Ok(0)
        }
        Command::Run {
            page_size,
            poll,
            argv,
        } => {
            let poll = parse_duration(&poll)
                .map_err(|e| anyhow::anyhow!("invalid --poll value: {e}"))?;
            let tracker = Tracker::with_process_launcher(config);
            let id = tracker.start_run(argv)?;
            follow(&tracker, id, page_size, poll).await
        }
    }
}

/// Print new log lines as they appear until the run finishes.
async fn follow(
    tracker: &Tracker,
    id: RunId,
    page_size: usize,
    poll: std::time::Duration,
) -> Result<i32> {
    info!(run_id = %id, "following run output");

    let mut offset = 0usize;
    let mut abort_sent = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let page = tracker.get_run_log(id, offset, page_size)?;
        {
            let mut stdout = std::io::stdout().lock();
            for line in &page.items {
                writeln!(stdout, "{line}").context("writing run output")?;
            }
            stdout.flush().ok();
        }
        offset = page.offset + page.items.len();

        if page.finished && offset >= page.count {
            break;
        }

        // A full page means more is already waiting.
        if page.items.len() == page.page_size {
            continue;
        }

        tokio::select! {
            res = &mut ctrl_c, if !abort_sent => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                abort_sent = true;
                let outcome = tracker.abort_run(id)?;
                info!(run_id = %id, ?outcome, "abort requested from terminal");
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }

    let outcome = tracker
        .run_outcome(id)?
        .context("run finished without an outcome")?;
    debug!(run_id = %id, %outcome, "run finished");
    Ok(outcome.exit_code())
}

fn print_supported_commands(config: &TrackerConfig) {
    let commands = &config.commands;
    match &commands.program {
        Some(program) => println!("program: {program}"),
        None => println!("program: argv[0]"),
    }

    if commands.allowed.is_empty() {
        println!("commands: any");
    } else {
        println!("commands ({}):", commands.allowed.len());
        for cmd in &commands.allowed {
            println!("  - {cmd}");
        }
    }
}
