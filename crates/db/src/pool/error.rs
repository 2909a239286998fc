//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`ConnectionPool::acquire`](super::ConnectionPool::acquire).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Every slot stayed leased for the whole acquire timeout.
    #[error("Timed out after {waited:?} waiting for a database connection")]
    Timeout {
        /// Time spent waiting.
        waited: Duration,
    },

    /// A slot was free but no connection could be opened.
    #[error("Database unavailable after {attempts} connection attempt(s): {message}")]
    ConnectionUnavailable {
        /// Connection attempts made.
        attempts: u32,
        /// Last connect error.
        message: String,
    },

    /// The pool has been shut down.
    #[error("Connection pool is closed")]
    Closed,
}
