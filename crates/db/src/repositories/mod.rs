//! Repository abstractions for data access.
//!
//! Repositories borrow a leased connection for the duration of one report;
//! they never acquire connections themselves.

pub mod report;

pub use report::{ReportRepository, classify};
