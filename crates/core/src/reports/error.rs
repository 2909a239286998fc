//! Report error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while validating or producing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Invalid date range.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// A date field could not be parsed.
    #[error("Invalid date for {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate {
        /// Request field name.
        field: &'static str,
        /// Raw value supplied.
        value: String,
    },

    /// Request shape not accepted for this report kind.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No data found.
    #[error("No data found for the specified criteria")]
    NoDataFound,

    /// The leased connection dropped while in use.
    #[error("Database connection lost: {0}")]
    ConnectionLost(String),

    /// A query failed for a reason other than a dropped connection.
    #[error("Query failed: {0}")]
    Query(String),

    /// The workbook could not be rendered.
    #[error("Render failed: {0}")]
    Render(String),
}

impl ReportError {
    /// Validation failures are caught before admission.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDateRange { .. } | Self::InvalidDate { .. } | Self::InvalidRequest(_)
        )
    }

    /// Whether retrying on a fresh connection may succeed.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Render(err.to_string())
    }
}
