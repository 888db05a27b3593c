//! Error types.
//!
//! Recoverable conditions only. Broken invariants inside the arena or
//! the books (double free, stale handle, index drift, quantity underflow)
//! panic instead of returning an error.

use thiserror::Error;

/// Arena allocation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena exhausted: all {capacity} slots in use")]
    Exhausted { capacity: u32 },
}

/// Errors surfaced at the engine intake
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unsupported instruction kind: {0}")]
    UnsupportedKind(i32),

    #[error("engine queue is closed")]
    QueueClosed,

    #[error("engine queue is full")]
    QueueFull,
}

/// Packet envelope errors
#[derive(Error, Debug)]
pub enum WireError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("payload encoding failed: {0}")]
    Payload(#[from] bincode::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
