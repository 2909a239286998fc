//! JX Report Server
//!
//! Main entry point for the store report service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jxreport_api::{AppState, create_router};
use jxreport_core::admission::AdmissionController;
use jxreport_db::{
    ConnectionPool, MySqlConnector, MySqlReportExecutor, MySqlReportProducer, PoolOptions,
    ReportRunner,
};
use jxreport_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jxreport=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.workers_exceed_pool() {
        warn!(
            max_workers = config.reports.max_workers,
            pool_size = config.database.pool_size,
            "More report workers than pooled connections; extra reports will wait for a connection"
        );
    }

    // Connections are opened lazily on first lease
    let pool = ConnectionPool::new(
        MySqlConnector::new(&config.database),
        PoolOptions::from_config(&config.database),
    );
    let admission = Arc::new(AdmissionController::new(config.reports.max_workers));
    let executor = Arc::new(MySqlReportExecutor::new(
        admission,
        pool,
        MySqlReportProducer,
        config.reports.admission_timeout(),
    ));
    info!(
        db_host = %config.database.host,
        db_name = %config.database.name,
        pool_size = config.database.pool_size,
        max_workers = config.reports.max_workers,
        "Report executor ready"
    );

    // Create router
    let runner: Arc<dyn ReportRunner> = executor.clone();
    let app = create_router(AppState::new(runner));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining report executor");
    executor.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting shutdown"),
        () = terminate => info!("Received SIGTERM, starting shutdown"),
    }
}
