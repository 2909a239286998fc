//! Report producers: turn a request into workbook bytes on one connection.

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use tracing::{debug, info};

use jxreport_core::reports::{
    ComparisonReport, DailyReport, RenderedReport, ReportError, ReportPeriods, ReportRequest,
    ShopDirectory, render_comparison, render_daily,
};

use crate::repositories::ReportRepository;

/// Produces one report on a leased connection.
///
/// Implementations may issue any number of queries on `conn` but must not
/// acquire further connections. A dropped connection is reported as
/// [`ReportError::ConnectionLost`] so the caller can retry on a fresh one.
#[async_trait]
pub trait ReportProducer<Conn: Send>: Send + Sync + 'static {
    /// Builds the workbook for `request`.
    async fn produce(
        &self,
        request: &ReportRequest,
        conn: &mut Conn,
    ) -> Result<RenderedReport, ReportError>;
}

/// Producer reading the store statistics schema over MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlReportProducer;

#[async_trait]
impl ReportProducer<MySqlConnection> for MySqlReportProducer {
    async fn produce(
        &self,
        request: &ReportRequest,
        conn: &mut MySqlConnection,
    ) -> Result<RenderedReport, ReportError> {
        let mut repo = ReportRepository::new(conn);
        let filter = request.filter();

        let directory = ShopDirectory::from_accounts(repo.accounts(&filter.account_ids()).await?);
        let selection = filter.resolve(directory.shop_ids());
        if selection.is_empty() {
            info!(kind = %request.kind(), "Shop filter matched no shops");
            return Err(ReportError::NoDataFound);
        }
        let shop_ids = selection.as_ids();
        debug!(
            kind = %request.kind(),
            directory_shops = directory.len(),
            filtered = shop_ids.as_ref().map(Vec::len),
            "Resolved shop selection"
        );

        match *request.periods() {
            ReportPeriods::Day(date) => {
                let rows = repo.daily_rows(date, shop_ids.as_deref()).await?;
                if rows.is_empty() {
                    return Err(ReportError::NoDataFound);
                }

                let reported: Vec<&str> = rows.iter().map(|r| r.shop_id.as_str()).collect();
                let coupons = repo
                    .coupon_orders(DailyReport::coupon_window_start(date), date, &reported)
                    .await?;

                let report = DailyReport::assemble(date, rows, &directory, |shop| {
                    coupons.get(shop).copied().unwrap_or(0)
                });
                render_blocking(move || render_daily(&report)).await
            }
            ReportPeriods::Comparison { first, second } => {
                debug!(
                    first = %first.label(),
                    first_days = first.days(),
                    second = %second.label(),
                    second_days = second.days(),
                    "Querying comparison periods"
                );
                let first_rows = repo.period_rows(first, shop_ids.as_deref()).await?;
                let second_rows = repo.period_rows(second, shop_ids.as_deref()).await?;
                if first_rows.is_empty() && second_rows.is_empty() {
                    return Err(ReportError::NoDataFound);
                }

                let report = ComparisonReport::assemble(
                    request.kind(),
                    first,
                    second,
                    first_rows,
                    second_rows,
                    &directory,
                );
                render_blocking(move || render_comparison(&report)).await
            }
        }
    }
}

/// Runs CPU-bound rendering off the async workers.
async fn render_blocking<F>(render: F) -> Result<RenderedReport, ReportError>
where
    F: FnOnce() -> Result<RenderedReport, ReportError> + Send + 'static,
{
    tokio::task::spawn_blocking(render)
        .await
        .map_err(|e| ReportError::Render(format!("render task failed: {e}")))?
}
