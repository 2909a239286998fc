//! Rate, average and ranking helpers shared by every report layout.
//!
//! All figures are `Decimal`; a zero or negative denominator yields zero
//! instead of an error so one empty shop never fails a whole workbook.

use rust_decimal::{Decimal, RoundingStrategy};

/// Review rate (reviews / verified users) a shop must reach, in percent.
pub const REVIEW_RATE_TARGET: Decimal = Decimal::from_parts(30, 0, 0, false, 0);
/// Collect rate (collects / ordering users) a shop must reach, in percent.
pub const COLLECT_RATE_TARGET: Decimal = Decimal::from_parts(40, 0, 0, false, 0);
/// Coupon orders required over the trailing seven days.
pub const COUPON_ORDERS_TARGET: i64 = 10;
/// Ad orders required on the report day.
pub const AD_ORDERS_TARGET: i64 = 1;
/// Ranks at or above this value are shown as "above 100".
pub const RANK_CUTOFF: i64 = 100;

/// Label for a met target.
pub const QUALIFIED: &str = "达标";
/// Label for a missed target.
pub const NOT_QUALIFIED: &str = "未达标";

/// `numerator / denominator * 100`, unrounded.
#[must_use]
pub fn percent(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(denominator)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Percentage rounded to one decimal place.
#[must_use]
pub fn rate(numerator: Decimal, denominator: Decimal) -> Decimal {
    percent(numerator, denominator).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Percentage of two counts, rounded to one decimal place.
#[must_use]
pub fn count_rate(numerator: i64, denominator: i64) -> Decimal {
    rate(Decimal::from(numerator), Decimal::from(denominator))
}

/// `total / count` rounded to two decimal places.
#[must_use]
pub fn average(total: Decimal, count: i64) -> Decimal {
    if count <= 0 {
        return Decimal::ZERO;
    }
    total
        .checked_div(Decimal::from(count))
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Money rounded to cents.
#[must_use]
pub fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats a percentage as `12.3%`.
#[must_use]
pub fn format_percent(value: Decimal) -> String {
    format!("{:.1}%", value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

/// Summary-sheet rank label: `第N名`, `大于100名`, or `--` when unranked.
#[must_use]
pub fn rank_label(rank: Option<i64>) -> String {
    match rank {
        Some(r) if r > 0 && r < RANK_CUTOFF => format!("第{r}名"),
        Some(r) if r >= RANK_CUTOFF => "大于100名".to_string(),
        _ => "--".to_string(),
    }
}

/// Detail-sheet rank line prefixed with the shop's trade area.
#[must_use]
pub fn rank_with_area(area: &str, rank: Option<i64>) -> String {
    match rank {
        Some(r) if r > 0 && r < RANK_CUTOFF => format!("{area}：第{r}名"),
        _ => format!("{area}：大于100名"),
    }
}

/// Label for a target check.
#[must_use]
pub const fn qualification(passed: bool) -> &'static str {
    if passed { QUALIFIED } else { NOT_QUALIFIED }
}
