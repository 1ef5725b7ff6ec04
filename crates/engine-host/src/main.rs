//! Engine host
//!
//! Reads positions from stdin, one per line, and prints one JSON result per
//! analysis to stdout. A new position supersedes the one still being analyzed.
//!
//! Input lines:
//!   <fen>                        analyze at the default depth
//!   depth <n> <fen>              analyze at depth n
//!   reconfigure <threads> <hash> restart the engine with new settings
//!   quit

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use engine_host::config::timeout_from_secs;
use engine_host::uci_core::options::clamp_depth;
use engine_host::{
    AnalysisResult, AnalysisService, CoordinatorSettings, EngineConfig, HostConfig,
    ProcessLauncher,
};

#[derive(Parser, Debug)]
#[command(name = "engine-host", about = "Evaluate chess positions with a UCI engine")]
struct Cli {
    /// Engine binary (overrides STOCKFISH_PATH)
    #[arg(long)]
    engine: Option<String>,

    /// Engine threads (overrides ENGINE_THREADS)
    #[arg(long)]
    threads: Option<u32>,

    /// Engine hash in MB (overrides ENGINE_HASH_MB)
    #[arg(long)]
    hash: Option<u32>,

    /// Default search depth (overrides ANALYSIS_DEPTH)
    #[arg(long)]
    depth: Option<u32>,

    /// Per-request timeout in seconds (overrides ANALYSIS_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Report scores from White's point of view instead of the side to move
    #[arg(long)]
    white_relative: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    fen: &'a str,
    score: Option<String>,
    #[serde(flatten)]
    result: &'a AnalysisResult,
}

enum Input<'a> {
    Analyze { fen: &'a str, depth: Option<u32> },
    Reconfigure { threads: u32, hash_mb: u32 },
    Quit,
    Invalid(&'static str),
}

fn parse_input(line: &str) -> Input<'_> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("quit") => Input::Quit,
        Some("reconfigure") => {
            let threads = tokens.next().and_then(|v| v.parse().ok());
            let hash_mb = tokens.next().and_then(|v| v.parse().ok());
            match (threads, hash_mb) {
                (Some(threads), Some(hash_mb)) => Input::Reconfigure { threads, hash_mb },
                _ => Input::Invalid("usage: reconfigure <threads> <hash_mb>"),
            }
        }
        Some("depth") => {
            let depth = tokens.next().and_then(|v| v.parse().ok());
            let fen = skip_token(skip_token(line));
            match depth {
                Some(depth) if !fen.is_empty() => Input::Analyze {
                    fen,
                    depth: Some(clamp_depth(depth)),
                },
                _ => Input::Invalid("usage: depth <n> <fen>"),
            }
        }
        _ => Input::Analyze {
            fen: line.trim(),
            depth: None,
        },
    }
}

/// `s` with its first whitespace-separated token and the whitespace
/// around it removed.
fn skip_token(s: &str) -> &str {
    s.trim_start()
        .split_once(char::is_whitespace)
        .map_or("", |(_, rest)| rest.trim())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = HostConfig::from_env()?;
    if let Some(engine) = cli.engine {
        config.stockfish_path = engine;
    }
    if cli.threads.is_some() || cli.hash.is_some() {
        config.engine = EngineConfig::clamped(
            cli.threads.unwrap_or(config.engine.threads()),
            cli.hash.unwrap_or(config.engine.hash_mb()),
        );
    }
    if let Some(depth) = cli.depth {
        config.default_depth = clamp_depth(depth);
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout = timeout_from_secs(secs)?;
    }
    info!(
        engine = %config.stockfish_path,
        threads = config.engine.threads(),
        hash_mb = config.engine.hash_mb(),
        depth = config.default_depth,
        "Host config loaded"
    );

    let launcher = ProcessLauncher::new(config.stockfish_path.clone());
    let (service, coordinator) =
        AnalysisService::spawn(launcher, CoordinatorSettings::from(&config));
    // Later requests retry the start.
    if let Err(e) = service.start().await {
        error!(error = %e, "Engine failed to start");
    }

    let white_relative = cli.white_relative;
    let mut analyses = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Input::Quit => break,
            Input::Invalid(usage) => warn!(input = %line, "{usage}"),
            Input::Reconfigure { threads, hash_mb } => {
                let config = EngineConfig::clamped(threads, hash_mb);
                if let Err(e) = service.reconfigure(config.threads(), config.hash_mb()).await {
                    error!(error = %e, "Reconfigure failed");
                }
            }
            Input::Analyze { fen, depth } => {
                let fen = fen.to_string();
                // Queue before spawning so input order decides which request supersedes.
                let pending = service.submit(fen.clone(), depth);
                analyses.spawn(async move {
                    let mut result = pending.result().await;
                    if white_relative {
                        result = result.white_relative(&fen);
                    }
                    let report = Report {
                        fen: &fen,
                        score: result.score_label(),
                        result: &result,
                    };
                    match serde_json::to_string(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => error!(error = %e, "Failed to encode result"),
                    }
                });
            }
        }
    }

    while analyses.join_next().await.is_some() {}

    service.shutdown().await;
    coordinator.await?;
    Ok(())
}
