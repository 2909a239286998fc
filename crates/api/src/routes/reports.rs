//! Report download routes.
//!
//! Each handler validates its body, then hands a [`ReportRequest`] to the
//! runner. Validation failures never take an admission ticket or a
//! connection.

use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::debug;

use jxreport_core::reports::{
    DateRange, ReportArtifact, ReportError, ReportKind, ReportRequest, ShopFilter, parse_date,
};

use crate::{AppState, error::ApiError};

/// Row count header on successful downloads.
pub const REPORT_ROWS_HEADER: HeaderName = HeaderName::from_static("x-report-rows");
/// Generation time header on successful downloads.
pub const REPORT_DURATION_HEADER: HeaderName = HeaderName::from_static("x-report-duration-ms");

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/report/daily", post(daily_report))
        .route("/api/report/weekly", post(weekly_report))
        .route("/api/report/monthly", post(monthly_report))
        .route("/api/report/custom", post(custom_report))
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Body of `POST /api/report/daily`.
#[derive(Debug, Deserialize)]
pub struct DailyReportBody {
    /// Report date, `YYYY-MM-DD`.
    pub report_date: String,
    /// Restrict to shops of these platform accounts.
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    /// Only accepted on custom reports; rejected here.
    #[serde(default)]
    pub shop_ids: Option<Vec<String>>,
}

impl DailyReportBody {
    /// Validates the body.
    pub fn into_request(self) -> Result<ReportRequest, ReportError> {
        let date = parse_date("report_date", &self.report_date)?;
        ReportRequest::daily_filtered(date, ShopFilter::new(self.accounts, self.shop_ids))
    }
}

/// Body of `POST /api/report/weekly`.
#[derive(Debug, Deserialize)]
pub struct WeeklyReportBody {
    /// Baseline week start.
    pub week1_start: String,
    /// Baseline week end.
    pub week1_end: String,
    /// Compared week start.
    pub week2_start: String,
    /// Compared week end.
    pub week2_end: String,
    /// Restrict to shops of these platform accounts.
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    /// Only accepted on custom reports; rejected here.
    #[serde(default)]
    pub shop_ids: Option<Vec<String>>,
}

impl WeeklyReportBody {
    /// Validates the body.
    pub fn into_request(self) -> Result<ReportRequest, ReportError> {
        ReportRequest::comparison(
            ReportKind::Weekly,
            DateRange::parse("week1_start", &self.week1_start, "week1_end", &self.week1_end)?,
            DateRange::parse("week2_start", &self.week2_start, "week2_end", &self.week2_end)?,
            ShopFilter::new(self.accounts, self.shop_ids),
        )
    }
}

/// Body of `POST /api/report/monthly`.
#[derive(Debug, Deserialize)]
pub struct MonthlyReportBody {
    /// Baseline month start.
    pub month1_start: String,
    /// Baseline month end.
    pub month1_end: String,
    /// Compared month start.
    pub month2_start: String,
    /// Compared month end.
    pub month2_end: String,
    /// Restrict to shops of these platform accounts.
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    /// Only accepted on custom reports; rejected here.
    #[serde(default)]
    pub shop_ids: Option<Vec<String>>,
}

impl MonthlyReportBody {
    /// Validates the body.
    pub fn into_request(self) -> Result<ReportRequest, ReportError> {
        ReportRequest::comparison(
            ReportKind::Monthly,
            DateRange::parse(
                "month1_start",
                &self.month1_start,
                "month1_end",
                &self.month1_end,
            )?,
            DateRange::parse(
                "month2_start",
                &self.month2_start,
                "month2_end",
                &self.month2_end,
            )?,
            ShopFilter::new(self.accounts, self.shop_ids),
        )
    }
}

/// Body of `POST /api/report/custom`.
#[derive(Debug, Deserialize)]
pub struct CustomReportBody {
    /// Baseline period start.
    pub period1_start: String,
    /// Baseline period end.
    pub period1_end: String,
    /// Compared period start.
    pub period2_start: String,
    /// Compared period end.
    pub period2_end: String,
    /// Restrict to these shop ids.
    #[serde(default)]
    pub shop_ids: Option<Vec<String>>,
    /// Restrict to shops of these platform accounts.
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
}

impl CustomReportBody {
    /// Validates the body.
    pub fn into_request(self) -> Result<ReportRequest, ReportError> {
        ReportRequest::comparison(
            ReportKind::Custom,
            DateRange::parse(
                "period1_start",
                &self.period1_start,
                "period1_end",
                &self.period1_end,
            )?,
            DateRange::parse(
                "period2_start",
                &self.period2_start,
                "period2_end",
                &self.period2_end,
            )?,
            ShopFilter::new(self.accounts, self.shop_ids),
        )
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/report/daily
async fn daily_report(
    State(state): State<AppState>,
    body: Result<Json<DailyReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    run(&state, body.into_request()?).await
}

/// POST /api/report/weekly
async fn weekly_report(
    State(state): State<AppState>,
    body: Result<Json<WeeklyReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    run(&state, body.into_request()?).await
}

/// POST /api/report/monthly
async fn monthly_report(
    State(state): State<AppState>,
    body: Result<Json<MonthlyReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    run(&state, body.into_request()?).await
}

/// POST /api/report/custom
async fn custom_report(
    State(state): State<AppState>,
    body: Result<Json<CustomReportBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    run(&state, body.into_request()?).await
}

async fn run(state: &AppState, request: ReportRequest) -> Result<Response, ApiError> {
    debug!(kind = %request.kind(), "Report request accepted");
    let artifact = state.runner.run(request).await?;
    Ok(download(artifact))
}

/// Turns an artifact into an attachment response.
fn download(artifact: ReportArtifact) -> Response {
    let headers = [
        (header::CONTENT_TYPE, artifact.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename()),
        ),
        (REPORT_ROWS_HEADER, artifact.row_count().to_string()),
        (
            REPORT_DURATION_HEADER,
            artifact.generated_in().as_millis().to_string(),
        ),
    ];
    (headers, Body::from(artifact.into_content())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn weekly(week1_start: &str, week1_end: &str) -> WeeklyReportBody {
        WeeklyReportBody {
            week1_start: week1_start.into(),
            week1_end: week1_end.into(),
            week2_start: "2025-12-08".into(),
            week2_end: "2025-12-14".into(),
            accounts: None,
            shop_ids: None,
        }
    }

    #[test]
    fn test_daily_body_parses_date() {
        let body = DailyReportBody {
            report_date: "2025-12-18".into(),
            accounts: Some(vec!["acc1".into()]),
            shop_ids: None,
        };
        let request = body.into_request().unwrap();
        assert_eq!(request.kind(), ReportKind::Daily);
        assert_eq!(request.file_stem(), "daily_20251218");
        assert!(request.filter().has_accounts());
    }

    #[rstest]
    #[case("2025-12-01", "2025-12-07", true)]
    #[case("2025-12-07", "2025-12-01", false)]
    #[case("2025/12/01", "2025-12-07", false)]
    #[case("", "2025-12-07", false)]
    fn test_weekly_body_validation(#[case] start: &str, #[case] end: &str, #[case] valid: bool) {
        let result = weekly(start, end).into_request();
        assert_eq!(result.is_ok(), valid);
        if let Err(e) = result {
            assert!(e.is_validation());
        }
    }

    #[test]
    fn test_shop_ids_rejected_outside_custom() {
        let daily = DailyReportBody {
            report_date: "2025-12-18".into(),
            accounts: None,
            shop_ids: Some(vec!["1001".into()]),
        };
        assert!(daily.into_request().unwrap_err().is_validation());

        let weekly = WeeklyReportBody {
            shop_ids: Some(vec!["1001".into()]),
            ..weekly("2025-12-01", "2025-12-07")
        };
        assert!(weekly.into_request().unwrap_err().is_validation());
    }

    #[test]
    fn test_custom_body_keeps_shop_ids() {
        let body = CustomReportBody {
            period1_start: "2025-11-01".into(),
            period1_end: "2025-11-30".into(),
            period2_start: "2025-12-01".into(),
            period2_end: "2025-12-31".into(),
            shop_ids: Some(vec!["1001".into(), "1002".into()]),
            accounts: None,
        };
        let request = body.into_request().unwrap();
        assert_eq!(request.kind(), ReportKind::Custom);
        assert_eq!(request.filter().shop_ids().len(), 2);
    }

    #[test]
    fn test_invalid_date_names_field() {
        let body = MonthlyReportBody {
            month1_start: "2025-11-01".into(),
            month1_end: "2025-11-31".into(),
            month2_start: "2025-12-01".into(),
            month2_end: "2025-12-31".into(),
            accounts: None,
            shop_ids: None,
        };
        let err = body.into_request().unwrap_err();
        assert!(err.to_string().contains("month1_end"));
    }
}
