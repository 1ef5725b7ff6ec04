//! Host configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use uci_core::options::{clamp_depth, DEFAULT_DEPTH, DEFAULT_HASH_MB, DEFAULT_THREADS};
use uci_core::EngineConfig;

use crate::error::EngineError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Path to the engine binary
    pub stockfish_path: String,

    /// Threads and hash applied at handshake
    pub engine: EngineConfig,

    /// Search depth used when a request does not name one
    pub default_depth: u32,

    /// How long a request may wait for `bestmove`
    pub timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "stockfish".to_string(),
            engine: EngineConfig::default(),
            default_depth: DEFAULT_DEPTH,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables.
    ///
    /// Values outside the supported ranges are clamped; values that do not
    /// parse are an error.
    pub fn from_env() -> Result<Self, EngineError> {
        let stockfish_path =
            env::var("STOCKFISH_PATH").unwrap_or_else(|_| "stockfish".to_string());

        let threads = read_env_or("ENGINE_THREADS", DEFAULT_THREADS)?;
        let hash_mb = read_env_or("ENGINE_HASH_MB", DEFAULT_HASH_MB)?;
        let default_depth = read_env_or("ANALYSIS_DEPTH", DEFAULT_DEPTH)?;
        let timeout_secs = read_env_or("ANALYSIS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            stockfish_path,
            engine: EngineConfig::clamped(threads, hash_mb),
            default_depth: clamp_depth(default_depth),
            timeout: timeout_from_secs(timeout_secs)?,
        })
    }
}

/// Request timeout in whole seconds; zero is rejected.
pub fn timeout_from_secs(secs: u64) -> Result<Duration, EngineError> {
    if secs == 0 {
        return Err(EngineError::Config("timeout must be at least 1 second".into()));
    }
    Ok(Duration::from_secs(secs))
}

fn read_env_or<T: FromStr>(key: &str, default: T) -> Result<T, EngineError> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|_| EngineError::Config(format!("{key} is not a valid number: {val:?}"))),
        Err(_) => Ok(default),
    }
}
