//! Core logic of the store report service.
//!
//! This crate has no web or database dependencies. It owns request
//! admission and everything about a report except fetching its rows.
//!
//! # Modules
//!
//! - `admission` - Bounded concurrency for report generation
//! - `reports` - Report requests, layouts and workbook rendering

pub mod admission;
pub mod reports;
