//! Shared errors and configuration for the JX report service.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types with HTTP status mapping
//! - Layered configuration management (files, prefixed env, legacy env)

pub mod config;
pub mod error;

pub use config::{AppConfig, DatabaseConfig, ReportsConfig, ServerConfig};
pub use error::{AppError, AppResult};
