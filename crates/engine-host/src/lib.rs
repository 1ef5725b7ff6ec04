//! engine-host
//!
//! Runs a UCI chess engine on behalf of callers that want position
//! evaluations: owns the engine process, serializes and cancels requests,
//! and turns engine output into [`AnalysisResult`]s.

pub use uci_core;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod relay;
pub mod session;

pub use config::HostConfig;
pub use coordinator::{AnalysisRequest, AnalysisService, CoordinatorSettings, PendingAnalysis};
pub use error::EngineError;
pub use relay::{ChannelLauncher, ChannelWorker, OutputSink, ProcessLauncher, WorkerLauncher, WorkerLink};
pub use session::{EngineSession, SessionState};
pub use uci_core::{AnalysisResult, EngineConfig, ResultStatus};
