//! Engine session: owns the worker, runs the handshake, tracks readiness.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uci_core::{parse_line, EngineConfig, EngineLine, UciCommand};

use crate::error::EngineError;
use crate::relay::{OutputSink, RelayEvent, RelayEventKind, WorkerLauncher, WorkerLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Handshake sent, waiting for `readyok`
    Initializing,
    Ready,
    /// The worker was torn down or exited
    Terminated,
}

pub struct EngineSession {
    launcher: Box<dyn WorkerLauncher>,
    link: Option<Box<dyn WorkerLink>>,
    state: SessionState,
    config: Option<EngineConfig>,
    /// Bumped on every start so output from older workers can be recognized
    epoch: u64,
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl EngineSession {
    /// Create a session and the receiving end of its output stream.
    pub fn new(launcher: impl WorkerLauncher) -> (Self, mpsc::UnboundedReceiver<RelayEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            launcher: Box::new(launcher),
            link: None,
            state: SessionState::Uninitialized,
            config: None,
            epoch: 0,
            events,
        };
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// True when there is no worker and `start` has to be called first.
    pub fn needs_start(&self) -> bool {
        matches!(
            self.state,
            SessionState::Uninitialized | SessionState::Terminated
        )
    }

    pub fn config(&self) -> Option<EngineConfig> {
        self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Tear down any running worker, launch a new one and send the handshake.
    ///
    /// Returns once the handshake is queued; the session turns `Ready` later,
    /// when the worker answers `readyok`.
    pub fn start(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        self.terminate();

        self.epoch += 1;
        let sink = OutputSink::new(self.epoch, self.events.clone());
        let link = match self.launcher.launch(sink) {
            Ok(link) => link,
            Err(e) => {
                error!(epoch = self.epoch, error = %e, "Engine failed to start");
                self.state = SessionState::Uninitialized;
                return Err(e);
            }
        };

        self.link = Some(link);
        self.config = Some(config);
        self.state = SessionState::Initializing;
        info!(
            epoch = self.epoch,
            threads = config.threads(),
            hash_mb = config.hash_mb(),
            "Engine starting"
        );

        self.send(&UciCommand::Uci);
        self.send(&UciCommand::threads(config.threads()));
        self.send(&UciCommand::hash(config.hash_mb()));
        self.send(&UciCommand::IsReady);
        Ok(())
    }

    pub fn send(&mut self, command: &UciCommand) {
        self.send_command(&command.to_string());
    }

    /// Forward a raw command. Without a worker, or if delivery fails, the
    /// command is dropped and logged.
    pub fn send_command(&mut self, text: &str) {
        let Some(link) = self.link.as_mut() else {
            warn!(cmd = text, "No engine running, dropping command");
            return;
        };
        debug!(epoch = self.epoch, cmd = text, "engine <");
        if let Err(e) = link.send(text) {
            warn!(epoch = self.epoch, cmd = text, error = %e, "Command not delivered");
        }
    }

    /// Destroy the worker. Idempotent.
    pub fn terminate(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.terminate();
            self.state = SessionState::Terminated;
            info!(epoch = self.epoch, "Engine terminated");
        }
    }

    /// Take one relayed event. Returns the parsed line when it came from the
    /// current worker; handles readiness and worker exit along the way.
    pub fn accept(&mut self, event: RelayEvent) -> Option<EngineLine> {
        if event.epoch != self.epoch || self.link.is_none() {
            debug!(epoch = event.epoch, "Dropping output from a retired engine");
            return None;
        }

        match event.kind {
            RelayEventKind::Line(line) => {
                debug!(epoch = self.epoch, line = %line, "engine >");
                let parsed = parse_line(&line);
                if parsed == EngineLine::ReadyOk && self.state == SessionState::Initializing {
                    self.state = SessionState::Ready;
                    info!(epoch = self.epoch, "Engine ready");
                }
                Some(parsed)
            }
            RelayEventKind::Failed(message) => {
                warn!(epoch = self.epoch, error = %message, "Engine transport error");
                None
            }
            RelayEventKind::Closed => {
                error!(epoch = self.epoch, "Engine exited unexpectedly");
                self.terminate();
                None
            }
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.terminate();
    }
}
