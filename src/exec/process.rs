// src/exec/process.rs

//! Operations backed by a child process.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::CommandsSection;
use crate::errors::{Result, TrackerError};

use super::operation::{Operation, OperationError, OperationFuture, OperationLauncher, OutputSink, RunContext};

const READ_CHUNK: usize = 4096;

/// Launches each run as a child process.
///
/// With `program` configured, a run's argv is appended to
/// `program prefix_args...`; otherwise `argv[0]` is the executable. When an
/// allow-list is configured, `argv[0]` must be on it.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    commands: CommandsSection,
}

impl ProcessLauncher {
    pub fn new(commands: CommandsSection) -> Self {
        Self { commands }
    }
}

impl OperationLauncher for ProcessLauncher {
    fn prepare(&self, argv: &[String]) -> Result<Box<dyn Operation>> {
        let Some(first) = argv.first() else {
            return Err(TrackerError::InvalidArgument(
                "no command arguments given".to_string(),
            ));
        };

        if first.trim().is_empty() {
            return Err(TrackerError::InvalidArgument(
                "command must not be blank".to_string(),
            ));
        }

        if !self.commands.allowed.is_empty() && !self.commands.allowed.iter().any(|c| c == first) {
            return Err(TrackerError::InvalidArgument(format!(
                "unsupported command '{first}'; expected one of: {}",
                self.commands.allowed.join(", ")
            )));
        }

        let (program, args) = match &self.commands.program {
            Some(program) => {
                let mut args = self.commands.prefix_args.clone();
                args.extend(argv.iter().cloned());
                (program.clone(), args)
            }
            None => (first.clone(), argv[1..].to_vec()),
        };

        Ok(Box::new(ProcessOperation::new(program, args)))
    }

    fn supported_commands(&self) -> Vec<String> {
        self.commands.allowed.clone()
    }
}

/// A single child process whose stdout/stderr feed the run's log.
#[derive(Debug, Clone)]
pub struct ProcessOperation {
    program: String,
    args: Vec<String>,
}

impl ProcessOperation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Operation for ProcessOperation {
    fn run(self: Box<Self>, ctx: RunContext) -> OperationFuture {
        Box::pin(run_process(*self, ctx))
    }
}

async fn run_process(op: ProcessOperation, ctx: RunContext) -> std::result::Result<i32, OperationError> {
    info!(
        run_id = %ctx.run_id(),
        program = %op.program,
        args = ?op.args,
        "starting run process"
    );

    let mut cmd = Command::new(&op.program);
    cmd.args(&op.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Err(OperationError::User(format!(
                "failed to start '{}': {e}",
                op.program
            )));
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let output = async {
        let (out, err) = tokio::join!(pump(stdout, ctx.stdout.clone()), pump(stderr, ctx.stderr.clone()));
        for res in [out, err] {
            if let Err(e) = res {
                warn!(run_id = %ctx.run_id(), error = %e, "error reading process output");
            }
        }
    };

    // Either the process exits on its own (normal case), or cooperative
    // cancellation is requested and the process is killed.
    tokio::select! {
        (status_res, ()) = async { tokio::join!(child.wait(), output) } => {
            let status = status_res
                .with_context(|| format!("waiting for process '{}'", op.program))?;
            let code = status.code().unwrap_or(-1);

            info!(
                run_id = %ctx.run_id(),
                exit_code = code,
                success = status.success(),
                "run process exited"
            );
            Ok(code)
        }

        _ = ctx.cancelled() => {
            info!(run_id = %ctx.run_id(), "cancellation requested; killing run process");
            if let Err(e) = child.kill().await {
                warn!(
                    run_id = %ctx.run_id(),
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Err(OperationError::Cancelled)
        }
    }
}

/// Copy a pipe into a sink, keeping UTF-8 sequences split across reads
/// intact.
async fn pump<R>(reader: Option<R>, sink: OutputSink) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buf = [0u8; READ_CHUNK];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&buf[..n]);

        let valid = match std::str::from_utf8(&carry) {
            Ok(s) => s.len(),
            // Incomplete sequence at the end: keep it for the next read.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => carry.len(),
        };

        sink.write(&String::from_utf8_lossy(&carry[..valid]));
        carry.drain(..valid);
    }

    if !carry.is_empty() {
        sink.write(&String::from_utf8_lossy(&carry));
    }

    debug!(stream = ?sink.stream(), "process output stream closed");
    Ok(())
}
