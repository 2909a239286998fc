//! Property-based tests for the reports module.

use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;
use rstest::rstest;
use rust_decimal::Decimal;

use super::metrics;
use super::sheet::{MAX_SHEET_NAME_CHARS, SheetNames, clean_sheet_name};
use super::types::{
    DateRange, ReportKind, ReportRequest, ShopFilter, ShopSelection, parse_date,
};
use super::{PeriodMetrics, ReportError};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, d).unwrap()
}

proptest! {
    /// A rate of a part over its whole stays within 0..=100.
    #[test]
    fn prop_rate_of_part_is_bounded(whole in 0i64..1_000_000, part_ratio in 0u32..=100) {
        let part = whole * i64::from(part_ratio) / 100;
        let rate = metrics::count_rate(part, whole);
        prop_assert!(rate >= Decimal::ZERO);
        prop_assert!(rate <= Decimal::ONE_HUNDRED);
        prop_assert!(rate.scale() <= 1);
    }

    /// Averages are always rounded to cents.
    #[test]
    fn prop_average_has_two_decimals(total in 0i64..10_000_000, count in -5i64..10_000) {
        let avg = metrics::average(Decimal::new(total, 2), count);
        prop_assert!(avg.scale() <= 2);
        if count <= 0 {
            prop_assert_eq!(avg, Decimal::ZERO);
        }
    }

    /// Difference rates are exactly the difference of displayed rates.
    #[test]
    fn prop_rate_difference_matches_display(
        v1 in 0i64..10_000, e1 in 0i64..10_000,
        v2 in 0i64..10_000, e2 in 0i64..10_000,
    ) {
        let first = PeriodMetrics { visit_users: v1, exposure_users: e1, ..PeriodMetrics::default() };
        let second = PeriodMetrics { visit_users: v2, exposure_users: e2, ..PeriodMetrics::default() };
        let diff = second.exposure_visit_rate() - first.exposure_visit_rate();
        prop_assert_eq!(
            metrics::format_percent(diff),
            format!("{:.1}%", diff)
        );
    }

    /// Cleaned sheet names are never empty, never too long, never contain
    /// forbidden characters.
    #[test]
    fn prop_clean_sheet_name_is_valid(raw in ".{0,64}") {
        let name = clean_sheet_name(&raw);
        prop_assert!(!name.is_empty());
        prop_assert!(name.chars().count() <= MAX_SHEET_NAME_CHARS);
        prop_assert!(!name.contains(['\\', '/', '*', '?', ':', '[', ']']));
    }

    /// Allocated names are unique whatever the input sequence.
    #[test]
    fn prop_allocated_names_are_unique(raws in proptest::collection::vec("[a-cA-C汇总]{0,3}", 1..40)) {
        let mut names = SheetNames::with_summary();
        let mut seen = std::collections::HashSet::new();
        seen.insert("汇总".to_lowercase());
        for raw in raws {
            let name = names.allocate(&raw);
            prop_assert!(name.chars().count() <= MAX_SHEET_NAME_CHARS);
            prop_assert!(seen.insert(name.to_lowercase()), "duplicate sheet name {}", name);
        }
    }
}

#[rstest]
#[case(1, 7, true)]
#[case(7, 7, true)]
#[case(8, 7, false)]
fn test_date_range_ordering(#[case] start: u32, #[case] end: u32, #[case] ok: bool) {
    let result = DateRange::new(day(start), day(end));
    assert_eq!(result.is_ok(), ok);
    if let Err(err) = result {
        assert!(matches!(err, ReportError::InvalidDateRange { .. }));
        assert!(err.is_validation());
    }
}

#[rstest]
#[case("1000-01-01", 1000)]
#[case("9999-12-31", 9999)]
fn test_parse_date_year_bounds(#[case] raw: &str, #[case] year: i32) {
    assert_eq!(parse_date("report_date", raw).unwrap().year(), year);
}

#[rstest]
#[case("2025-12-01")]
#[case(" 2025-12-01 ")]
fn test_parse_date_accepts_iso(#[case] raw: &str) {
    let range = DateRange::parse("start", raw, "end", "2025-12-07").unwrap();
    assert_eq!(range.start(), day(1));
    assert_eq!(range.days(), 7);
}

#[rstest]
#[case("2025/12/01")]
#[case("2025-13-01")]
#[case("")]
#[case("yesterday")]
#[case("-262143-01-01")]
#[case("0999-12-31")]
#[case("10000-01-01")]
#[case("+262142-12-31")]
fn test_parse_date_rejects_garbage(#[case] raw: &str) {
    let err = DateRange::parse("week1_start", raw, "week1_end", "2025-12-07").unwrap_err();
    match err {
        ReportError::InvalidDate { field, .. } => assert_eq!(field, "week1_start"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_range_label() {
    let range = DateRange::new(day(1), day(7)).unwrap();
    assert_eq!(range.label(), "2025.12.01-2025.12.07");
}

#[test]
fn test_filter_ignores_blank_entries() {
    let filter = ShopFilter::new(Some(vec![" ".into(), String::new()]), Some(vec![]));
    assert!(filter.is_empty());
    assert_eq!(filter.resolve(Vec::<String>::new()), ShopSelection::All);
}

#[test]
fn test_filter_by_accounts() {
    let filter = ShopFilter::accounts(Some(vec!["acc".into()]));
    let selection = filter.resolve(vec!["1".to_string(), "2".to_string()]);
    assert_eq!(selection.as_ids(), Some(vec!["1", "2"]));
}

#[test]
fn test_filter_intersects_accounts_and_shops() {
    let filter = ShopFilter::new(
        Some(vec!["acc".into()]),
        Some(vec!["2".into(), "3".into()]),
    );
    let selection = filter.resolve(vec!["1".to_string(), "2".to_string()]);
    assert_eq!(selection.as_ids(), Some(vec!["2"]));
}

#[test]
fn test_accounts_without_shops_select_nothing() {
    let filter = ShopFilter::accounts(Some(vec!["ghost".into()]));
    assert!(filter.resolve(Vec::<String>::new()).is_empty());
}

#[test]
fn test_comparison_rejects_daily_kind() {
    let range = DateRange::single(day(1));
    let err = ReportRequest::comparison(ReportKind::Daily, range, range, ShopFilter::default())
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_shop_ids_only_for_custom() {
    let range = DateRange::single(day(1));
    let filter = ShopFilter::new(None, Some(vec!["1".into()]));

    assert!(ReportRequest::comparison(ReportKind::Weekly, range, range, filter.clone()).is_err());
    assert!(ReportRequest::comparison(ReportKind::Custom, range, range, filter).is_ok());
}

#[test]
fn test_daily_rejects_shop_ids() {
    let filter = ShopFilter::new(Some(vec!["acc1".into()]), Some(vec!["1".into()]));
    let err = ReportRequest::daily_filtered(day(18), filter).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("shop_ids"));

    let accounts_only = ShopFilter::new(Some(vec!["acc1".into()]), None);
    let request = ReportRequest::daily_filtered(day(18), accounts_only).unwrap();
    assert_eq!(request, ReportRequest::daily(day(18), Some(vec!["acc1".into()])));
}

#[test]
fn test_file_stems() {
    let daily = ReportRequest::daily(day(18), None);
    assert_eq!(daily.file_stem(), "daily_20251218");

    let weekly = ReportRequest::comparison(
        ReportKind::Weekly,
        DateRange::new(day(1), day(7)).unwrap(),
        DateRange::new(day(8), day(14)).unwrap(),
        ShopFilter::default(),
    )
    .unwrap();
    assert_eq!(weekly.file_stem(), "weekly_20251208_20251214");
}
