use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use cmdtrack::errors::{Result, TrackerError};
use cmdtrack::exec::{Operation, OperationError, OperationFuture, OperationLauncher, RunContext};

/// One step of a scripted operation.
#[derive(Debug, Clone)]
pub enum Step {
    /// Raw text to stdout (no implicit newline).
    Out(String),
    /// Raw text to stderr.
    Err(String),
    /// A whole line to stdout.
    Line(String),
    /// Sleep, but stop with `Cancelled` if cancellation is requested.
    Sleep(Duration),
    /// Wait until cancelled, then stop with `Cancelled`.
    WaitForCancel,
    /// Wait for the notify, ignoring cancellation.
    Gate(Arc<Notify>),
    /// Never finish and ignore cancellation; only a forced abort stops it.
    Hang,
    Exit(i32),
    FailUser(String),
    Fault(String),
    Panic(String),
}

/// An operation that plays back a list of steps against its run context.
///
/// Without an explicit `Exit`, the script ends with exit code 0.
#[derive(Debug, Clone)]
pub struct ScriptedOperation {
    steps: Vec<Step>,
}

impl ScriptedOperation {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

impl Operation for ScriptedOperation {
    fn run(self: Box<Self>, ctx: RunContext) -> OperationFuture {
        Box::pin(async move {
            for step in self.steps {
                match step {
                    Step::Out(text) => ctx.stdout.write(&text),
                    Step::Err(text) => ctx.stderr.write(&text),
                    Step::Line(line) => ctx.stdout.write_line(&line),
                    Step::Sleep(dur) => {
                        tokio::select! {
                            _ = tokio::time::sleep(dur) => {}
                            _ = ctx.cancelled() => return Err(OperationError::Cancelled),
                        }
                    }
                    Step::WaitForCancel => {
                        ctx.cancelled().await;
                        return Err(OperationError::Cancelled);
                    }
                    Step::Gate(notify) => notify.notified().await,
                    Step::Hang => std::future::pending::<()>().await,
                    Step::Exit(code) => return Ok(code),
                    Step::FailUser(msg) => return Err(OperationError::User(msg)),
                    Step::Fault(msg) => {
                        return Err(OperationError::Fault(
                            anyhow::anyhow!("inner cause").context(msg),
                        ));
                    }
                    Step::Panic(msg) => panic!("{msg}"),
                }
            }
            Ok(0)
        })
    }
}

/// Launcher that maps `argv[0]` to a script.
///
/// Unknown commands are rejected as invalid arguments, like a real launcher
/// with an allow-list.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    scripts: BTreeMap<String, Vec<Step>>,
    launched: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, command: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(command.to_string(), steps);
        self
    }

    /// Argv of every run prepared so far.
    pub fn launched(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.launched)
    }
}

impl OperationLauncher for ScriptedLauncher {
    fn prepare(&self, argv: &[String]) -> Result<Box<dyn Operation>> {
        let command = argv
            .first()
            .ok_or_else(|| TrackerError::InvalidArgument("no command arguments given".into()))?;

        let steps = self.scripts.get(command).cloned().ok_or_else(|| {
            TrackerError::InvalidArgument(format!("unsupported command '{command}'"))
        })?;

        self.launched.lock().unwrap().push(argv.to_vec());
        Ok(Box::new(ScriptedOperation::new(steps)))
    }

    fn supported_commands(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }
}
