//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request, rejected before admission.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No data matched the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Waiting for an admission ticket or a connection exceeded its bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The pool could not supply a working connection.
    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    /// Query or render failure while producing a report.
    #[error("Report generation failed: {0}")]
    ReportGeneration(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Timeout(_) => 429,
            Self::ConnectionUnavailable(_) => 503,
            Self::ReportGeneration(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConnectionUnavailable(_) => "CONNECTION_UNAVAILABLE",
            Self::ReportGeneration(_) => "REPORT_GENERATION_ERROR",
        }
    }

    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectionUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::NotFound(String::new()), 404, "NOT_FOUND")]
    #[case(AppError::Timeout(String::new()), 429, "TIMEOUT")]
    #[case(
        AppError::ConnectionUnavailable(String::new()),
        503,
        "CONNECTION_UNAVAILABLE"
    )]
    #[case(
        AppError::ReportGeneration(String::new()),
        500,
        "REPORT_GENERATION_ERROR"
    )]
    fn test_status_and_code(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_retriable_errors() {
        assert!(AppError::Timeout("admission".into()).is_retriable());
        assert!(AppError::ConnectionUnavailable("db".into()).is_retriable());
        assert!(!AppError::Validation("bad".into()).is_retriable());
        assert!(!AppError::ReportGeneration("render".into()).is_retriable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(AppError::NotFound("msg".into()).to_string(), "Not found: msg");
        assert_eq!(AppError::Timeout("msg".into()).to_string(), "Timed out: msg");
        assert_eq!(
            AppError::ConnectionUnavailable("msg".into()).to_string(),
            "Connection unavailable: msg"
        );
        assert_eq!(
            AppError::ReportGeneration("msg".into()).to_string(),
            "Report generation failed: msg"
        );
    }
}
