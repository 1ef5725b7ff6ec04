//! Analysis request coordination.
//!
//! A single task owns the engine session and the pending-request slot.
//! Callers talk to it through [`AnalysisService`], a cheap cloneable handle.
//! At most one request is active: a new request, a terminal `bestmove` line
//! or the timeout resolves it, whichever comes first, and the reply channel
//! is consumed when the slot is taken so nothing resolves twice.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use uci_core::{AnalysisResult, EngineConfig, EngineLine, ResultStatus, SearchAccumulator, UciCommand};

use crate::config::HostConfig;
use crate::error::EngineError;
use crate::relay::{RelayEvent, WorkerLauncher};
use crate::session::EngineSession;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub engine: EngineConfig,
    pub default_depth: u32,
    pub timeout: Duration,
}

impl From<&HostConfig> for CoordinatorSettings {
    fn from(config: &HostConfig) -> Self {
        Self {
            engine: config.engine,
            default_depth: config.default_depth,
            timeout: config.timeout,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&HostConfig::default())
    }
}

/// One analysis request as the coordinator sees it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub fen: String,
    pub depth: u32,
    pub created_at: Instant,
}

enum Command {
    Start {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Analyze {
        fen: String,
        depth: Option<u32>,
        reply: oneshot::Sender<AnalysisResult>,
    },
    Reconfigure {
        config: EngineConfig,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the coordinator task.
#[derive(Clone)]
pub struct AnalysisService {
    commands: mpsc::UnboundedSender<Command>,
}

impl AnalysisService {
    /// Spawn the coordinator task. The engine is not started until
    /// [`start`](Self::start) or the first [`analyze`](Self::analyze).
    pub fn spawn(
        launcher: impl WorkerLauncher,
        settings: CoordinatorSettings,
    ) -> (Self, JoinHandle<()>) {
        let (session, events) = EngineSession::new(launcher);
        let (commands, rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator {
            session,
            settings,
            active: None,
            accumulator: SearchAccumulator::default(),
            abandoned_searches: 0,
            next_id: 0,
        };
        let handle = tokio::spawn(coordinator.run(rx, events));
        (Self { commands }, handle)
    }

    /// Start the engine with the configured settings if it is not running.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start { reply })
            .map_err(|_| EngineError::ServiceStopped)?;
        rx.await.map_err(|_| EngineError::ServiceStopped)?
    }

    /// Analyze a position. Always resolves: requests that do not complete
    /// come back as a neutral result carrying the reason in `status`.
    ///
    /// `depth` of `None` or `0` uses the configured default.
    pub async fn analyze(&self, fen: impl Into<String>, depth: Option<u32>) -> AnalysisResult {
        self.submit(fen, depth).result().await
    }

    /// Queue an analysis now and wait for its result later.
    ///
    /// Requests are queued in call order, so of two `submit` calls the
    /// second always supersedes the first regardless of when the returned
    /// handles are awaited.
    pub fn submit(&self, fen: impl Into<String>, depth: Option<u32>) -> PendingAnalysis {
        let (reply, rx) = oneshot::channel();
        let command = Command::Analyze {
            fen: fen.into(),
            depth,
            reply,
        };
        let reply = self.commands.send(command).ok().map(|_| rx);
        PendingAnalysis { reply }
    }

    /// Restart the engine with new settings, cancelling any active request.
    pub async fn reconfigure(&self, threads: u32, hash_mb: u32) -> Result<(), EngineError> {
        let config = EngineConfig::new(threads, hash_mb)?;
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Reconfigure { config, reply })
            .map_err(|_| EngineError::ServiceStopped)?;
        rx.await.map_err(|_| EngineError::ServiceStopped)?
    }

    /// Cancel any active request, quit the engine and stop the coordinator.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }
}

/// A queued analysis. Dropping it does not cancel the request.
#[must_use = "the result is only observed by awaiting `result`"]
pub struct PendingAnalysis {
    /// `None` when the coordinator had already stopped
    reply: Option<oneshot::Receiver<AnalysisResult>>,
}

impl PendingAnalysis {
    pub async fn result(self) -> AnalysisResult {
        match self.reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| AnalysisResult::neutral(ResultStatus::Cancelled)),
            None => AnalysisResult::neutral(ResultStatus::Unavailable),
        }
    }
}

struct ActiveRequest {
    id: u64,
    request: AnalysisRequest,
    reply: oneshot::Sender<AnalysisResult>,
    /// `go` has been sent for this request
    searching: bool,
    deadline: Instant,
}

struct Coordinator {
    session: EngineSession,
    settings: CoordinatorSettings,
    active: Option<ActiveRequest>,
    accumulator: SearchAccumulator,
    /// Searches given up on whose `bestmove` is still to come
    abandoned_searches: u32,
    next_id: u64,
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<RelayEvent>,
    ) {
        loop {
            let deadline = self.active.as_ref().map(|active| active.deadline);

            tokio::select! {
                biased;

                Some(event) = events.recv() => self.handle_event(event),

                command = commands.recv() => {
                    let Some(command) = command else {
                        self.shutdown();
                        break;
                    };
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }

                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.expire();
                }
            }
        }

        debug!("Coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start { reply } => {
                let result = if self.session.needs_start() {
                    self.start_session()
                } else {
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::Analyze { fen, depth, reply } => self.accept(fen, depth, reply),
            Command::Reconfigure { config, reply } => {
                info!(
                    threads = config.threads(),
                    hash_mb = config.hash_mb(),
                    "Reconfiguring engine"
                );
                self.release(ResultStatus::Cancelled);
                self.settings.engine = config;
                let _ = reply.send(self.start_session());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn start_session(&mut self) -> Result<(), EngineError> {
        // A fresh worker has no searches in flight.
        self.abandoned_searches = 0;
        self.session.start(self.settings.engine)
    }

    fn accept(&mut self, fen: String, depth: Option<u32>, reply: oneshot::Sender<AnalysisResult>) {
        self.release(ResultStatus::Cancelled);
        self.accumulator = SearchAccumulator::default();

        self.next_id += 1;
        let id = self.next_id;
        let request = AnalysisRequest {
            fen,
            depth: depth
                .filter(|d| *d > 0)
                .unwrap_or(self.settings.default_depth),
            created_at: Instant::now(),
        };

        if self.session.needs_start() {
            if let Err(e) = self.start_session() {
                warn!(request_id = id, error = %e, "Engine unavailable for analysis");
                let _ = reply.send(AnalysisResult::neutral(ResultStatus::Unavailable));
                return;
            }
        }

        debug!(request_id = id, depth = request.depth, "Analysis request accepted");
        self.active = Some(ActiveRequest {
            id,
            request,
            reply,
            searching: false,
            // Covers the readiness wait; re-armed when the search starts.
            deadline: Instant::now() + self.settings.timeout,
        });

        if self.session.is_ready() {
            self.dispatch();
        } else {
            debug!(request_id = id, state = ?self.session.state(), "Waiting for engine");
        }
    }

    /// Send the search for the active request, if it has not been sent yet.
    fn dispatch(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.searching {
            return;
        }
        active.searching = true;
        active.deadline = Instant::now() + self.settings.timeout;

        let id = active.id;
        let fen = active.request.fen.clone();
        let depth = active.request.depth;

        debug!(request_id = id, depth, "Starting search");
        self.session.send(&UciCommand::Stop);
        self.session.send(&UciCommand::PositionFen(fen));
        self.session.send(&UciCommand::GoDepth(depth));
    }

    fn handle_event(&mut self, event: RelayEvent) {
        let Some(line) = self.session.accept(event) else {
            return;
        };

        match line {
            EngineLine::ReadyOk => {
                if self.session.is_ready() {
                    self.dispatch();
                }
            }
            EngineLine::Progress {
                depth,
                score,
                pv_move,
            } => {
                if self.abandoned_searches > 0 {
                    return;
                }
                if self.active.as_ref().is_some_and(|active| active.searching) {
                    self.accumulator.update(depth, score, pv_move);
                }
            }
            EngineLine::BestMove(best_move) => {
                if self.abandoned_searches > 0 {
                    self.abandoned_searches -= 1;
                    debug!(
                        remaining = self.abandoned_searches,
                        "Discarding bestmove of an abandoned search"
                    );
                    return;
                }
                self.complete(best_move);
            }
            EngineLine::Unrecognized => {}
        }
    }

    fn complete(&mut self, best_move: Option<String>) {
        let active = match self.active.take() {
            Some(active) if active.searching => active,
            other => {
                self.active = other;
                debug!("bestmove with no search pending, ignoring");
                return;
            }
        };

        let result = std::mem::take(&mut self.accumulator).finish(best_move);
        info!(
            request_id = active.id,
            best_move = %result.best_move,
            evaluation = ?result.evaluation,
            mate = ?result.mate,
            elapsed_ms = active.request.created_at.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        let _ = active.reply.send(result);
    }

    fn expire(&mut self) {
        let searching = self.active.as_ref().is_some_and(|active| active.searching);
        self.release(ResultStatus::TimedOut);
        if searching {
            self.session.send(&UciCommand::Stop);
        }
    }

    /// Resolve the active request, if any, with the neutral result.
    fn release(&mut self, status: ResultStatus) {
        let Some(active) = self.active.take() else {
            return;
        };
        if active.searching {
            self.abandoned_searches += 1;
        }
        self.accumulator = SearchAccumulator::default();

        if status == ResultStatus::TimedOut {
            warn!(request_id = active.id, "Analysis timed out");
        } else {
            info!(request_id = active.id, ?status, "Analysis request cancelled");
        }
        let _ = active.reply.send(AnalysisResult::neutral(status));
    }

    fn shutdown(&mut self) {
        self.release(ResultStatus::Cancelled);
        if !self.session.needs_start() {
            self.session.send(&UciCommand::Quit);
        }
        self.session.terminate();
        info!("Analysis service shut down");
    }
}
