//! Engine configuration and the user-facing ranges for it.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_THREADS: u32 = 1;
pub const DEFAULT_HASH_MB: u32 = 16;
pub const DEFAULT_DEPTH: u32 = 14;

pub const THREADS_RANGE: RangeInclusive<u32> = 1..=16;
pub const HASH_MB_RANGE: RangeInclusive<u32> = 16..=1024;
pub const DEPTH_RANGE: RangeInclusive<u32> = 8..=24;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("thread count must be at least 1")]
    ZeroThreads,

    #[error("hash size must be at least 1 MB")]
    ZeroHash,
}

/// Settings applied to the engine during the handshake.
///
/// Fixed for the lifetime of a session; changing them means restarting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    threads: u32,
    hash_mb: u32,
}

impl EngineConfig {
    pub fn new(threads: u32, hash_mb: u32) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if hash_mb == 0 {
            return Err(ConfigError::ZeroHash);
        }
        Ok(Self { threads, hash_mb })
    }

    /// Build from user input, pulling values into the supported ranges.
    pub fn clamped(threads: u32, hash_mb: u32) -> Self {
        Self {
            threads: clamp(threads, &THREADS_RANGE),
            hash_mb: clamp(hash_mb, &HASH_MB_RANGE),
        }
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    pub fn hash_mb(&self) -> u32 {
        self.hash_mb
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            hash_mb: DEFAULT_HASH_MB,
        }
    }
}

pub fn clamp_depth(depth: u32) -> u32 {
    clamp(depth, &DEPTH_RANGE)
}

fn clamp(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}
