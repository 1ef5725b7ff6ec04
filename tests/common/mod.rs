#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_host::{
    AnalysisService, ChannelLauncher, ChannelWorker, CoordinatorSettings, EngineConfig,
};
use tokio::sync::mpsc;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const TIMEOUT: Duration = Duration::from_secs(30);

/// What the fake engine does when it receives `go` for a position.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Print these lines right away
    Lines(Vec<String>),
    /// Keep searching until `stop`, then print a junk result for the search
    UntilStop,
}

pub fn lines(lines: &[&str]) -> Reply {
    Reply::Lines(lines.iter().map(|l| l.to_string()).collect())
}

type Responder = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

/// In-process stand-in for a UCI engine. Every launched worker gets its own
/// task; the commands each one received are recorded per worker.
#[derive(Clone)]
pub struct FakeEngine {
    pub transcripts: Arc<Mutex<Vec<Vec<String>>>>,
    respond: Responder,
    answers_isready: bool,
}

impl FakeEngine {
    pub fn new(respond: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            transcripts: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
            answers_isready: true,
        }
    }

    /// An engine that never becomes ready.
    pub fn unresponsive() -> Self {
        Self {
            answers_isready: false,
            ..Self::new(|_| Reply::UntilStop)
        }
    }

    pub fn launches(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    pub fn transcript(&self, worker: usize) -> Vec<String> {
        self.transcripts.lock().unwrap()[worker].clone()
    }

    /// Host every worker the launcher hands out.
    pub fn host(&self, mut workers: mpsc::UnboundedReceiver<ChannelWorker>) {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(worker) = workers.recv().await {
                let index = {
                    let mut transcripts = engine.transcripts.lock().unwrap();
                    transcripts.push(Vec::new());
                    transcripts.len() - 1
                };
                tokio::spawn(engine.clone().run(index, worker));
            }
        });
    }

    async fn run(self, index: usize, mut worker: ChannelWorker) {
        let mut fen = String::new();
        let mut searching = false;

        while let Some(cmd) = worker.commands.recv().await {
            self.transcripts.lock().unwrap()[index].push(cmd.clone());

            if cmd == "uci" {
                worker.output.line("id name FakeFish");
                worker.output.line("uciok");
            } else if cmd == "isready" {
                if self.answers_isready {
                    worker.output.line("readyok");
                }
            } else if let Some(position) = cmd.strip_prefix("position fen ") {
                fen = position.to_string();
            } else if cmd.starts_with("go") {
                match (self.respond)(&fen) {
                    Reply::Lines(lines) => {
                        for line in lines {
                            worker.output.line(line);
                        }
                    }
                    Reply::UntilStop => searching = true,
                }
            } else if cmd == "stop" {
                if searching {
                    searching = false;
                    worker.output.line("info depth 1 score mate 9 pv a1a2");
                    worker.output.line("bestmove a1a2");
                }
            } else if cmd == "quit" {
                break;
            }
        }
    }
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        engine: EngineConfig::default(),
        default_depth: 14,
        timeout: TIMEOUT,
    }
}

/// Spawn a coordinator whose workers are hosted by `engine`.
pub fn service(engine: &FakeEngine) -> AnalysisService {
    let (launcher, workers) = ChannelLauncher::new();
    engine.host(workers);
    let (service, _task) = AnalysisService::spawn(launcher, settings());
    service
}
