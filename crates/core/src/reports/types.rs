//! Report request and artifact types.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ReportError;

/// MIME type of every artifact.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Report kinds exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// One day, one summary row and one detail sheet per shop.
    Daily,
    /// Two weeks side by side.
    Weekly,
    /// Two months side by side.
    Monthly,
    /// Two arbitrary periods side by side.
    Custom,
}

impl ReportKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    /// Whether the kind compares two periods.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Years a MySQL `DATE` column can hold.
pub const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Parses a `YYYY-MM-DD` request field.
///
/// Dates outside [`SUPPORTED_YEARS`] are rejected.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ReportError> {
    let invalid = || ReportError::InvalidDate {
        field,
        value: value.to_string(),
    };
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    if !SUPPORTED_YEARS.contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}

/// Inclusive date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds and validates the range.
    pub fn parse(
        start_field: &'static str,
        start: &str,
        end_field: &'static str,
        end: &str,
    ) -> Result<Self, ReportError> {
        Self::new(parse_date(start_field, start)?, parse_date(end_field, end)?)
    }

    /// Range covering a single day.
    #[must_use]
    pub const fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// First day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, both bounds included.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Period label used in workbooks, e.g. `2025.12.01-2025.12.07`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y.%m.%d"),
            self.end.format("%Y.%m.%d")
        )
    }
}

/// Optional account / shop restrictions supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopFilter {
    accounts: BTreeSet<String>,
    shop_ids: BTreeSet<String>,
}

impl ShopFilter {
    /// Builds a filter, ignoring blank entries.
    #[must_use]
    pub fn new(accounts: Option<Vec<String>>, shop_ids: Option<Vec<String>>) -> Self {
        Self {
            accounts: normalize(accounts),
            shop_ids: normalize(shop_ids),
        }
    }

    /// Filter restricted to the given accounts only.
    #[must_use]
    pub fn accounts(accounts: Option<Vec<String>>) -> Self {
        Self::new(accounts, None)
    }

    /// Requested account identifiers.
    #[must_use]
    pub fn account_ids(&self) -> Vec<&str> {
        self.accounts.iter().map(String::as_str).collect()
    }

    /// Requested shop identifiers.
    #[must_use]
    pub const fn shop_ids(&self) -> &BTreeSet<String> {
        &self.shop_ids
    }

    /// Whether an account restriction was given.
    #[must_use]
    pub fn has_accounts(&self) -> bool {
        !self.accounts.is_empty()
    }

    /// Whether no restriction was given at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.shop_ids.is_empty()
    }

    /// Combines the filter with the shops owned by the requested accounts.
    ///
    /// Account and shop restrictions intersect when both are present.
    #[must_use]
    pub fn resolve<I>(&self, account_shops: I) -> ShopSelection
    where
        I: IntoIterator<Item = String>,
    {
        let by_account: Option<BTreeSet<String>> = self
            .has_accounts()
            .then(|| account_shops.into_iter().collect());
        let by_shop = (!self.shop_ids.is_empty()).then(|| self.shop_ids.clone());

        match (by_account, by_shop) {
            (None, None) => ShopSelection::All,
            (Some(shops), None) | (None, Some(shops)) => ShopSelection::Only(shops),
            (Some(accounts), Some(shops)) => {
                ShopSelection::Only(accounts.intersection(&shops).cloned().collect())
            }
        }
    }
}

fn normalize(values: Option<Vec<String>>) -> BTreeSet<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Shops a report covers after applying the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopSelection {
    /// No restriction.
    All,
    /// Only these shop ids; may be empty.
    Only(BTreeSet<String>),
}

impl ShopSelection {
    /// Whether the selection can never match a shop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(shops) if shops.is_empty())
    }

    /// Shop ids to pass to a query, `None` meaning unrestricted.
    #[must_use]
    pub fn as_ids(&self) -> Option<Vec<&str>> {
        match self {
            Self::All => None,
            Self::Only(shops) => Some(shops.iter().map(String::as_str).collect()),
        }
    }
}

/// Dates covered by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriods {
    /// A single report day.
    Day(NaiveDate),
    /// Two periods compared side by side; differences are `second - first`.
    Comparison {
        /// Baseline period.
        first: DateRange,
        /// Period compared against the baseline.
        second: DateRange,
    },
}

/// Validated, immutable report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    kind: ReportKind,
    periods: ReportPeriods,
    filter: ShopFilter,
}

impl ReportRequest {
    /// Daily report for `date`, optionally restricted to `accounts`.
    #[must_use]
    pub fn daily(date: NaiveDate, accounts: Option<Vec<String>>) -> Self {
        Self {
            kind: ReportKind::Daily,
            periods: ReportPeriods::Day(date),
            filter: ShopFilter::accounts(accounts),
        }
    }

    /// Daily report with a caller-supplied filter.
    ///
    /// Fails if the filter carries shop ids.
    pub fn daily_filtered(date: NaiveDate, filter: ShopFilter) -> Result<Self, ReportError> {
        check_shop_ids(ReportKind::Daily, &filter)?;
        Ok(Self {
            kind: ReportKind::Daily,
            periods: ReportPeriods::Day(date),
            filter,
        })
    }

    /// Two-period comparison report.
    ///
    /// Shop id restrictions are only accepted for [`ReportKind::Custom`].
    pub fn comparison(
        kind: ReportKind,
        first: DateRange,
        second: DateRange,
        filter: ShopFilter,
    ) -> Result<Self, ReportError> {
        if !kind.is_comparison() {
            return Err(ReportError::InvalidRequest(format!(
                "{kind} reports cover a single day"
            )));
        }
        check_shop_ids(kind, &filter)?;
        Ok(Self {
            kind,
            periods: ReportPeriods::Comparison { first, second },
            filter,
        })
    }

    /// Report kind.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Covered dates.
    #[must_use]
    pub const fn periods(&self) -> &ReportPeriods {
        &self.periods
    }

    /// Caller restrictions.
    #[must_use]
    pub const fn filter(&self) -> &ShopFilter {
        &self.filter
    }

    /// File name stem, e.g. `daily_20251218` or `weekly_20251208_20251214`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        match self.periods {
            ReportPeriods::Day(day) => format!("{}_{}", self.kind, day.format("%Y%m%d")),
            ReportPeriods::Comparison { second, .. } => format!(
                "{}_{}_{}",
                self.kind,
                second.start().format("%Y%m%d"),
                second.end().format("%Y%m%d")
            ),
        }
    }
}

/// Shop id restrictions are only accepted for [`ReportKind::Custom`].
fn check_shop_ids(kind: ReportKind, filter: &ShopFilter) -> Result<(), ReportError> {
    if kind != ReportKind::Custom && !filter.shop_ids().is_empty() {
        return Err(ReportError::InvalidRequest(format!(
            "shop_ids is only supported for custom reports, not {kind}"
        )));
    }
    Ok(())
}

/// Workbook bytes as produced, before execution metadata is attached.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    /// Serialized `.xlsx` file.
    pub content: Vec<u8>,
    /// Shops written to the summary sheet.
    pub row_count: usize,
}

/// Finished report handed to the caller.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    kind: ReportKind,
    filename: String,
    content: Bytes,
    row_count: usize,
    generated_in: Duration,
}

impl ReportArtifact {
    /// Wraps rendered bytes with a unique file name and timing metadata.
    #[must_use]
    pub fn new(request: &ReportRequest, rendered: RenderedReport, generated_in: Duration) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            kind: request.kind(),
            filename: format!("{}_{}.xlsx", request.file_stem(), &suffix[..8]),
            content: Bytes::from(rendered.content),
            row_count: rendered.row_count,
            generated_in,
        }
    }

    /// Report kind.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Download file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Shops covered.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.row_count
    }

    /// Time from the executor receiving the request to completion,
    /// including any wait for admission.
    #[must_use]
    pub const fn generated_in(&self) -> Duration {
        self.generated_in
    }

    /// MIME type.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consumes the artifact, returning the payload.
    #[must_use]
    pub fn into_content(self) -> Bytes {
        self.content
    }
}
