//! UCI text protocol: outgoing commands and classification of engine output lines.

use std::fmt;

use crate::eval::Score;

/// Token the engine prints as the best move when it has none (mate or stalemate).
pub const NO_MOVE: &str = "(none)";

/// A command sent to the engine, rendered as one protocol line via `Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    SetOption { name: &'static str, value: String },
    IsReady,
    Stop,
    PositionFen(String),
    GoDepth(u32),
    Quit,
}

impl UciCommand {
    pub fn threads(threads: u32) -> Self {
        UciCommand::SetOption {
            name: "Threads",
            value: threads.to_string(),
        }
    }

    pub fn hash(hash_mb: u32) -> Self {
        UciCommand::SetOption {
            name: "Hash",
            value: hash_mb.to_string(),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::SetOption { name, value } => {
                write!(f, "setoption name {name} value {value}")
            }
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::Stop => f.write_str("stop"),
            UciCommand::PositionFen(fen) => write!(f, "position fen {}", fen.trim()),
            UciCommand::GoDepth(depth) => write!(f, "go depth {depth}"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// One classified line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    /// `readyok`
    ReadyOk,
    /// `info ... pv ...` progress update
    Progress {
        depth: Option<u32>,
        score: Option<Score>,
        /// First move of the principal variation
        pv_move: Option<String>,
    },
    /// `bestmove <move>`; `None` when the engine reports `(none)` or omits the move
    BestMove(Option<String>),
    Unrecognized,
}

/// Classify a single line of engine output.
///
/// Never fails: anything that is not a well-formed readiness, progress or
/// terminal line comes back as [`EngineLine::Unrecognized`].
pub fn parse_line(line: &str) -> EngineLine {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"readyok") if tokens.len() == 1 => EngineLine::ReadyOk,
        Some(&"info") => parse_info(&tokens[1..]),
        Some(&"bestmove") => {
            let mv = tokens
                .get(1)
                .filter(|mv| **mv != NO_MOVE)
                .map(|mv| mv.to_string());
            EngineLine::BestMove(mv)
        }
        _ => EngineLine::Unrecognized,
    }
}

fn parse_info(tokens: &[&str]) -> EngineLine {
    // `info string` carries free text, so a "pv" inside it is not a marker
    if tokens.first() == Some(&"string") {
        return EngineLine::Unrecognized;
    }

    let Some(pv_at) = tokens.iter().position(|t| *t == "pv") else {
        return EngineLine::Unrecognized;
    };
    let header = &tokens[..pv_at];

    EngineLine::Progress {
        depth: value_after(header, "depth"),
        score: parse_score(header),
        pv_move: tokens.get(pv_at + 1).map(|mv| mv.to_string()),
    }
}

/// `score cp <int>` or `score mate <int>`
fn parse_score(tokens: &[&str]) -> Option<Score> {
    let at = tokens.iter().position(|t| *t == "score")?;
    let kind = *tokens.get(at + 1)?;
    let value: i32 = tokens.get(at + 2)?.parse().ok()?;
    match kind {
        "cp" => Some(Score::Centipawns(value)),
        "mate" => Some(Score::Mate(value)),
        _ => None,
    }
}

fn value_after<T: std::str::FromStr>(tokens: &[&str], key: &str) -> Option<T> {
    let at = tokens.iter().position(|t| *t == key)?;
    tokens.get(at + 1)?.parse().ok()
}
