//! Admission error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned while waiting for an admission ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No ticket freed up within the caller's bound.
    #[error("no report slot became available within {waited:?}")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The controller was closed (process shutting down).
    #[error("admission controller is closed")]
    Closed,
}
