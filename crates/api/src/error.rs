//! JSON error responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use jxreport_core::reports::ReportError;
use jxreport_db::ExecutionError;
use jxreport_shared::AppError;

/// Seconds a client is asked to back off before retrying.
pub const RETRY_AFTER_SECS: u32 = 5;

/// Error returned by route handlers, rendered as `{"error", "message"}`.
///
/// Retriable errors (timeouts, unavailable connections) carry `Retry-After`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        Self(err.into())
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        if err.is_validation() {
            Self(AppError::Validation(err.to_string()))
        } else {
            Self(AppError::ReportGeneration(err.to_string()))
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }

        let body = Json(json!({
            "error": self.0.error_code(),
            "message": self.0.to_string(),
        }));
        let mut response = (status, body).into_response();
        if self.0.is_retriable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Validation("bad".into()), StatusCode::BAD_REQUEST, false)]
    #[case(AppError::NotFound("none".into()), StatusCode::NOT_FOUND, false)]
    #[case(AppError::Timeout("busy".into()), StatusCode::TOO_MANY_REQUESTS, true)]
    #[case(
        AppError::ConnectionUnavailable("db".into()),
        StatusCode::SERVICE_UNAVAILABLE,
        true
    )]
    #[case(
        AppError::ReportGeneration("render".into()),
        StatusCode::INTERNAL_SERVER_ERROR,
        false
    )]
    fn test_response_status(
        #[case] err: AppError,
        #[case] status: StatusCode,
        #[case] retry_after: bool,
    ) {
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), status);
        assert_eq!(
            response.headers().contains_key(header::RETRY_AFTER),
            retry_after
        );
    }

    #[test]
    fn test_report_validation_error_is_bad_request() {
        let err = ApiError::from(ReportError::InvalidRequest("shop_ids".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(ReportError::Render("sheet".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
