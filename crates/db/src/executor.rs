//! Report execution: admission, connection lease, production, release.
//!
//! Every request takes an admission ticket, then leases one connection,
//! then runs the producer. Ticket and slot are RAII guards, so both are
//! handed back on every exit path including cancellation. A connection that
//! drops mid-report is discarded and the report is retried once on a fresh
//! connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use jxreport_core::admission::{AdmissionController, AdmissionError, AdmissionStatus};
use jxreport_core::reports::{RenderedReport, ReportArtifact, ReportError, ReportRequest};
use jxreport_shared::AppError;

use crate::pool::{ConnectionPool, Connector, PoolError, PoolStatus};
use crate::producer::ReportProducer;

/// Why a report could not be delivered.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No admission ticket was granted.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// No connection could be leased.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The producer failed.
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        let message = err.to_string();
        match err {
            ExecutionError::Admission(AdmissionError::Timeout { .. })
            | ExecutionError::Pool(PoolError::Timeout { .. }) => Self::Timeout(message),
            ExecutionError::Admission(AdmissionError::Closed)
            | ExecutionError::Pool(PoolError::Closed | PoolError::ConnectionUnavailable { .. })
            | ExecutionError::Report(ReportError::ConnectionLost(_)) => {
                Self::ConnectionUnavailable(message)
            }
            ExecutionError::Report(ReportError::NoDataFound) => Self::NotFound(message),
            ExecutionError::Report(e) if e.is_validation() => Self::Validation(message),
            ExecutionError::Report(_) => Self::ReportGeneration(message),
        }
    }
}

/// Admission and pool occupancy.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RuntimeStatus {
    /// Admission controller snapshot.
    pub admission: AdmissionStatus,
    /// Connection pool snapshot.
    pub pool: PoolStatus,
}

/// Object-safe entry point used by the HTTP layer.
#[async_trait]
pub trait ReportRunner: Send + Sync {
    /// Runs one report to completion.
    async fn run(&self, request: ReportRequest) -> Result<ReportArtifact, ExecutionError>;

    /// Current occupancy.
    fn status(&self) -> RuntimeStatus;
}

/// Runs reports under the admission bound with pooled connections.
pub struct ReportExecutor<C: Connector, P> {
    admission: Arc<AdmissionController>,
    pool: ConnectionPool<C>,
    producer: Arc<P>,
    admission_timeout: Option<Duration>,
}

impl<C: Connector, P> Clone for ReportExecutor<C, P> {
    fn clone(&self) -> Self {
        Self {
            admission: Arc::clone(&self.admission),
            pool: self.pool.clone(),
            producer: Arc::clone(&self.producer),
            admission_timeout: self.admission_timeout,
        }
    }
}

impl<C, P> ReportExecutor<C, P>
where
    C: Connector,
    P: ReportProducer<C::Connection>,
{
    /// Creates an executor. `admission_timeout` of `None` waits indefinitely.
    pub fn new(
        admission: Arc<AdmissionController>,
        pool: ConnectionPool<C>,
        producer: P,
        admission_timeout: Option<Duration>,
    ) -> Self {
        Self {
            admission,
            pool,
            producer: Arc::new(producer),
            admission_timeout,
        }
    }

    /// Admission controller.
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Connection pool.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// Runs one report.
    pub async fn execute(&self, request: ReportRequest) -> Result<ReportArtifact, ExecutionError> {
        let started = Instant::now();
        let kind = request.kind();

        let ticket = match self.admission_timeout {
            Some(timeout) => self.admission.acquire_ticket_timeout(timeout).await?,
            None => self.admission.acquire_ticket().await?,
        };

        let result = self.produce(&request).await;
        let held = ticket.held_for();
        let waited = ticket.waited();
        ticket.release();

        match result {
            Ok(rendered) => {
                let artifact = ReportArtifact::new(&request, rendered, started.elapsed());
                info!(
                    %kind,
                    rows = artifact.row_count(),
                    bytes = artifact.len(),
                    queued_ms = waited.as_millis(),
                    run_ms = held.as_millis(),
                    file = artifact.filename(),
                    "Report generated"
                );
                Ok(artifact)
            }
            Err(e) => {
                match &e {
                    ExecutionError::Report(ReportError::NoDataFound) => {
                        info!(%kind, "Report has no data");
                    }
                    other => error!(%kind, error = %other, run_ms = held.as_millis(), "Report failed"),
                }
                Err(e)
            }
        }
    }

    /// Closes admission, then the pool.
    pub async fn shutdown(&self) {
        self.admission.close();
        self.pool.shutdown().await;
    }

    async fn produce(&self, request: &ReportRequest) -> Result<RenderedReport, ExecutionError> {
        let mut slot = self.pool.acquire().await?;
        match self.producer.produce(request, &mut *slot).await {
            Err(e) if e.is_connection_lost() => {
                warn!(
                    connection = slot.id(),
                    error = %e,
                    "Connection lost while producing report, retrying on a fresh connection"
                );
                slot.mark_broken();
                drop(slot);

                let mut retry = self.pool.acquire().await?;
                let result = self.producer.produce(request, &mut *retry).await;
                if matches!(&result, Err(e) if e.is_connection_lost()) {
                    retry.mark_broken();
                }
                Ok(result?)
            }
            result => Ok(result?),
        }
    }
}

#[async_trait]
impl<C, P> ReportRunner for ReportExecutor<C, P>
where
    C: Connector,
    P: ReportProducer<C::Connection>,
{
    async fn run(&self, request: ReportRequest) -> Result<ReportArtifact, ExecutionError> {
        self.execute(request).await
    }

    fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            admission: self.admission.status(),
            pool: self.pool.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::admission_timeout(
        AdmissionError::Timeout { waited: Duration::from_secs(1) }.into(),
        "TIMEOUT"
    )]
    #[case::pool_timeout(PoolError::Timeout { waited: Duration::from_secs(30) }.into(), "TIMEOUT")]
    #[case::admission_closed(AdmissionError::Closed.into(), "CONNECTION_UNAVAILABLE")]
    #[case::pool_closed(PoolError::Closed.into(), "CONNECTION_UNAVAILABLE")]
    #[case::connect_failed(
        PoolError::ConnectionUnavailable { attempts: 2, message: "refused".into() }.into(),
        "CONNECTION_UNAVAILABLE"
    )]
    #[case::connection_lost(
        ReportError::ConnectionLost("reset".into()).into(),
        "CONNECTION_UNAVAILABLE"
    )]
    #[case::no_data(ReportError::NoDataFound.into(), "NOT_FOUND")]
    #[case::bad_range(
        ReportError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2025, 12, 8).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
        }
        .into(),
        "VALIDATION_ERROR"
    )]
    #[case::query(ReportError::Query("bad column".into()).into(), "REPORT_GENERATION_ERROR")]
    #[case::render(ReportError::Render("bad sheet".into()).into(), "REPORT_GENERATION_ERROR")]
    fn test_maps_to_app_error(#[case] err: ExecutionError, #[case] code: &str) {
        let message = err.to_string();
        let app = AppError::from(err);
        assert_eq!(app.error_code(), code);
        assert!(app.to_string().contains(&message));
    }
}
