//! Database layer of the store report service.
//!
//! This crate provides:
//! - A bounded pool of raw MySQL connections
//! - Report queries over the statistics tables
//! - The executor that runs reports under admission control

pub mod executor;
pub mod pool;
pub mod producer;
pub mod repositories;

pub use executor::{ExecutionError, ReportExecutor, ReportRunner, RuntimeStatus};
pub use pool::{
    ConnectionPool, ConnectionSlot, Connector, MySqlConnector, PoolError, PoolOptions, PoolStatus,
};
pub use producer::{MySqlReportProducer, ReportProducer};

/// Executor over MySQL connections.
pub type MySqlReportExecutor = ReportExecutor<MySqlConnector, MySqlReportProducer>;
