//! Transport between the session and the engine worker.
//!
//! Commands go out through a [`WorkerLink`]; output comes back as
//! [`RelayEvent`]s on a single unbounded channel, one event per line, in the
//! order the worker printed them. Every event is stamped with the epoch of the
//! worker that produced it so output from a replaced worker can be dropped.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub epoch: u64,
    pub kind: RelayEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEventKind {
    /// One line of worker output, without the trailing newline
    Line(String),
    /// The worker reported an error but may still be alive
    Failed(String),
    /// The worker's output ended; it is gone
    Closed,
}

/// Where a worker delivers its output.
#[derive(Debug, Clone)]
pub struct OutputSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<RelayEvent>,
}

impl OutputSink {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<RelayEvent>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Deliver one line. Returns false once nobody is listening.
    pub fn line(&self, line: impl Into<String>) -> bool {
        self.emit(RelayEventKind::Line(line.into()))
    }

    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.emit(RelayEventKind::Failed(message.into()))
    }

    pub fn closed(&self) -> bool {
        self.emit(RelayEventKind::Closed)
    }

    fn emit(&self, kind: RelayEventKind) -> bool {
        self.tx
            .send(RelayEvent {
                epoch: self.epoch,
                kind,
            })
            .is_ok()
    }
}

/// Command side of a running worker.
pub trait WorkerLink: Send {
    /// Queue one command line for the worker.
    fn send(&mut self, command: &str) -> Result<(), EngineError>;

    /// Destroy the worker. Calling it again does nothing.
    fn terminate(&mut self);
}

/// Creates workers. The session calls this for every (re)start.
pub trait WorkerLauncher: Send + 'static {
    fn launch(&mut self, output: OutputSink) -> Result<Box<dyn WorkerLink>, EngineError>;
}

// ---- Child process transport ----

/// Runs the engine as a child process speaking UCI over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&mut self, output: OutputSink) -> Result<Box<dyn WorkerLink>, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdout not captured".into()))?;

        // A single reader task keeps lines in emission order.
        let reader_sink = output.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if !reader_sink.line(line) {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        reader_sink.failed(format!("Failed to read from engine: {e}"));
                        break;
                    }
                }
            }
            reader_sink.closed();
        });

        let (commands, mut queued) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(cmd) = queued.recv().await {
                let written = async {
                    stdin.write_all(cmd.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = written {
                    output.failed(format!("Failed to write {cmd:?} to engine: {e}"));
                    return;
                }
            }
        });

        debug!(program = %self.program, pid = child.id(), "Engine process spawned");

        Ok(Box::new(ProcessLink {
            child,
            commands: Some(commands),
            reader,
            writer,
        }))
    }
}

struct ProcessLink {
    child: Child,
    commands: Option<mpsc::UnboundedSender<String>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WorkerLink for ProcessLink {
    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| EngineError::Transport("engine terminated".into()))?;
        commands
            .send(command.to_string())
            .map_err(|_| EngineError::Transport("engine stdin closed".into()))
    }

    fn terminate(&mut self) {
        if self.commands.take().is_none() {
            return;
        }
        self.reader.abort();
        self.writer.abort();
        let _ = self.child.start_kill();
    }
}

impl Drop for ProcessLink {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ---- In-process channel transport ----

/// Worker end of a channel transport: the commands it receives and the sink
/// it writes output lines to.
#[derive(Debug)]
pub struct ChannelWorker {
    pub commands: mpsc::UnboundedReceiver<String>,
    pub output: OutputSink,
}

/// Hands each launched worker to whoever hosts engines in-process, e.g. an
/// engine running on its own task or thread.
#[derive(Debug, Clone)]
pub struct ChannelLauncher {
    host: mpsc::UnboundedSender<ChannelWorker>,
}

impl ChannelLauncher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelWorker>) {
        let (host, workers) = mpsc::unbounded_channel();
        (Self { host }, workers)
    }
}

impl WorkerLauncher for ChannelLauncher {
    fn launch(&mut self, output: OutputSink) -> Result<Box<dyn WorkerLink>, EngineError> {
        let (commands, rx) = mpsc::unbounded_channel();
        self.host
            .send(ChannelWorker {
                commands: rx,
                output,
            })
            .map_err(|_| EngineError::Spawn("no engine host is accepting workers".into()))?;
        Ok(Box::new(ChannelLink {
            commands: Some(commands),
        }))
    }
}

struct ChannelLink {
    commands: Option<mpsc::UnboundedSender<String>>,
}

impl WorkerLink for ChannelLink {
    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| EngineError::Transport("engine terminated".into()))?;
        commands
            .send(command.to_string())
            .map_err(|_| EngineError::Transport("engine hung up".into()))
    }

    fn terminate(&mut self) {
        // Dropping the sender ends the worker's command stream.
        self.commands = None;
    }
}
