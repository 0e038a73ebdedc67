//! Common error types for pingwatch components.

use std::fmt;

/// A specialized Result type for pingwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for pingwatch operations.
///
/// Probe failures never show up here: a probe that times out or cannot reach
/// its target is recorded as `down` and the scheduler moves on. Only malformed
/// control requests and I/O at the edges are surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid server index {index} (roster has {len} servers)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Invalid probe interval: {0}s (must be at least 1s)")]
    InvalidInterval(u64),

    #[error("Roster error: {0}")]
    Roster(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new invalid index error.
    pub fn invalid_index(index: usize, len: usize) -> Self {
        Error::InvalidIndex { index, len }
    }

    /// Create a new roster error.
    pub fn roster(msg: impl fmt::Display) -> Self {
        Error::Roster(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Whether this error was caused by a malformed request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidIndex { .. } | Error::InvalidInterval(_) | Error::Roster(_)
        )
    }
}
