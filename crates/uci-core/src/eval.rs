//! Evaluation results and the per-request accumulator that builds them.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::Color;

/// Engine score, from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated)
    Mate(i32),
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    /// Superseded by a newer request, a reconfiguration or shutdown
    Cancelled,
    TimedOut,
    /// The engine could not be started
    Unavailable,
}

/// Final answer for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Best move in UCI notation; empty when the engine had none
    pub best_move: String,
    /// Evaluation in pawns (centipawns / 100)
    pub evaluation: Option<f64>,
    pub mate: Option<i32>,
    /// Deepest `depth` reported by the engine
    pub depth: Option<u32>,
    pub status: ResultStatus,
}

impl AnalysisResult {
    /// The neutral result handed to requests that did not complete.
    ///
    /// It reads as a level position (`0.0`); `status` tells it apart from a
    /// genuine draw evaluation.
    pub fn neutral(status: ResultStatus) -> Self {
        Self {
            best_move: String::new(),
            evaluation: Some(0.0),
            mate: None,
            depth: None,
            status,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    pub fn has_move(&self) -> bool {
        !self.best_move.is_empty()
    }

    /// Re-express the scores from White's point of view.
    ///
    /// Engines report from the side to move; a black-to-move FEN flips the sign.
    /// An unparseable FEN leaves the result untouched.
    pub fn white_relative(&self, fen: &str) -> Self {
        let mut result = self.clone();
        if side_to_move(fen) == Some(Color::Black) {
            result.evaluation = result.evaluation.map(|e| -e);
            result.mate = result.mate.map(|m| -m);
        }
        result
    }

    /// Short display label: `+0.35`, `-1.2`, `M3`, `M-3`.
    pub fn score_label(&self) -> Option<String> {
        if let Some(mate) = self.mate {
            return Some(format!("M{mate}"));
        }
        self.evaluation.map(|e| {
            if e > 0.0 {
                format!("+{e}")
            } else {
                format!("{e}")
            }
        })
    }
}

/// Side to move of a FEN string.
pub fn side_to_move(fen: &str) -> Option<Color> {
    let fen: Fen = fen.trim().parse().ok()?;
    Some(fen.as_setup().turn)
}

/// Best-move and score state gathered from progress lines of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchAccumulator {
    pub best_move: Option<String>,
    pub score: Option<Score>,
    pub depth: Option<u32>,
}

impl SearchAccumulator {
    /// Fold one progress update in. A new score replaces the previous one,
    /// so a centipawn score clears a mate score and vice versa.
    pub fn update(&mut self, depth: Option<u32>, score: Option<Score>, pv_move: Option<String>) {
        if depth.is_some() {
            self.depth = depth;
        }
        if score.is_some() {
            self.score = score;
        }
        if pv_move.is_some() {
            self.best_move = pv_move;
        }
    }

    /// Turn the accumulated state into a completed result.
    ///
    /// A terminal move of `None` (`bestmove (none)`) keeps the last move seen
    /// in progress updates.
    pub fn finish(self, final_move: Option<String>) -> AnalysisResult {
        let (evaluation, mate) = match self.score {
            Some(Score::Centipawns(cp)) => (Some(f64::from(cp) / 100.0), None),
            Some(Score::Mate(n)) => (None, Some(n)),
            None => (None, None),
        };

        AnalysisResult {
            best_move: final_move.or(self.best_move).unwrap_or_default(),
            evaluation,
            mate,
            depth: self.depth,
            status: ResultStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    #[test]
    fn test_centipawns_become_pawns() {
        let mut acc = SearchAccumulator::default();
        acc.update(Some(10), Some(Score::Centipawns(35)), Some("e2e4".into()));
        let result = acc.finish(Some("e2e4".into()));
        assert_eq!(result.best_move, "e2e4");
        assert_eq!(result.evaluation, Some(0.35));
        assert_eq!(result.mate, None);
        assert_eq!(result.depth, Some(10));
        assert!(result.is_completed());
    }

    #[test]
    fn test_later_score_replaces_earlier_kind() {
        let mut acc = SearchAccumulator::default();
        acc.update(None, Some(Score::Mate(-3)), Some("g8h8".into()));
        acc.update(None, Some(Score::Centipawns(10)), None);
        assert_eq!(acc.score, Some(Score::Centipawns(10)));

        acc.update(None, Some(Score::Mate(2)), None);
        let result = acc.finish(None);
        assert_eq!(result.evaluation, None);
        assert_eq!(result.mate, Some(2));
    }

    #[test]
    fn test_none_keeps_progress_move() {
        let mut acc = SearchAccumulator::default();
        acc.update(None, None, Some("a7a8q".into()));
        assert_eq!(acc.finish(None).best_move, "a7a8q");
    }

    #[test]
    fn test_none_without_progress_is_empty() {
        let result = SearchAccumulator::default().finish(None);
        assert_eq!(result.best_move, "");
        assert_eq!(result.evaluation, None);
        assert_eq!(result.mate, None);
        assert!(!result.has_move());
    }

    #[test]
    fn test_neutral() {
        let result = AnalysisResult::neutral(ResultStatus::TimedOut);
        assert_eq!(result.best_move, "");
        assert_eq!(result.evaluation, Some(0.0));
        assert_eq!(result.mate, None);
        assert!(!result.is_completed());
    }

    #[test]
    fn test_white_relative() {
        let mut acc = SearchAccumulator::default();
        acc.update(None, Some(Score::Centipawns(-50)), None);
        let result = acc.finish(Some("e7e5".into()));

        assert_eq!(result.white_relative(AFTER_E4_FEN).evaluation, Some(0.5));
        assert_eq!(result.white_relative(START_FEN).evaluation, Some(-0.5));
        assert_eq!(result.white_relative("not a fen").evaluation, Some(-0.5));
    }

    #[test]
    fn test_score_label() {
        let mut result = AnalysisResult::neutral(ResultStatus::Completed);
        result.evaluation = Some(0.35);
        assert_eq!(result.score_label().as_deref(), Some("+0.35"));
        result.evaluation = Some(-1.2);
        assert_eq!(result.score_label().as_deref(), Some("-1.2"));
        result.evaluation = None;
        result.mate = Some(-3);
        assert_eq!(result.score_label().as_deref(), Some("M-3"));
        result.mate = None;
        assert_eq!(result.score_label(), None);
    }

    #[test]
    fn test_side_to_move() {
        assert_eq!(side_to_move(START_FEN), Some(Color::White));
        assert_eq!(side_to_move(AFTER_E4_FEN), Some(Color::Black));
        assert_eq!(side_to_move(""), None);
    }

    #[test]
    fn test_result_json() {
        let result = AnalysisResult::neutral(ResultStatus::Cancelled);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["best_move"], "");
    }
}
