//! Store performance reports.
//!
//! Pure report logic with no database access:
//! - request validation and shop filtering
//! - the shop directory built from account records
//! - daily and two-period comparison layouts
//! - in-memory `.xlsx` rendering

pub mod comparison;
pub mod daily;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod render;
pub mod sheet;
pub mod types;

#[cfg(test)]
mod tests;

pub use comparison::{ComparisonReport, PeriodMetrics, PeriodRow, ShopComparison};
pub use daily::{DailyReport, DailyShopEntry, DailyShopMetrics};
pub use directory::{AccountRecord, RegionInfo, ShopDirectory, ShopProfile};
pub use error::ReportError;
pub use render::{render_comparison, render_daily};
pub use types::*;
