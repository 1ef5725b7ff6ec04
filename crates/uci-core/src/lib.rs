//! UCI protocol parsing and evaluation types, free of I/O.

pub mod eval;
pub mod options;
pub mod protocol;

pub use eval::{AnalysisResult, ResultStatus, Score, SearchAccumulator};
pub use options::{ConfigError, EngineConfig};
pub use protocol::{parse_line, EngineLine, UciCommand};
