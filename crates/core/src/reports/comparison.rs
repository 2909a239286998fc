//! Two-period comparison model shared by weekly, monthly and custom reports.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::directory::{ShopDirectory, ShopProfile};
use super::metrics;
use super::sheet::{Cell, RowStyle, SheetRow};
use super::types::{DateRange, ReportKind};

/// Rows per shop block on the summary sheet.
pub const BLOCK_ROWS: usize = 8;

/// Identity columns (A-E) merged down each block.
pub const IDENTITY_COLUMNS: u16 = 5;

/// Summary sheet column widths.
pub const SUMMARY_WIDTHS: [u16; 20] = [
    8, 18, 10, 10, 78, 26, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15,
];

const SALES_HEADER: [&str; 20] = [
    "序号",
    "运营",
    "城市",
    "销售",
    "门店",
    "数据周期",
    "优惠后核销额",
    "曝光人数",
    "访问人数",
    "曝光访问转化率",
    "下单人数",
    "下单券数",
    "下单转化率",
    "核销人数",
    "核销券数",
    "下单售价金额",
    "核销售价金额",
    "优惠码订单",
    "电话点击",
    "客单价",
];

const PROMOTION_HEADER: [&str; 15] = [
    "数据周期",
    "推广通花费",
    "推广通曝光",
    "推广通点击",
    "推广通点击均价",
    "推广通订单量",
    "推广通下单转化率",
    "推广通查看团购",
    "推广通查看电话",
    "在线咨询",
    "地址点击",
    "门店收藏",
    "收藏率",
    "新增好评数",
    "留评率",
];

const DIFFERENCE_LABEL: &str = "差值";
const UNKNOWN_SHOP: &str = "未知门店";

/// Aggregated figures of one shop over one period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodMetrics {
    /// Verified value after discounts.
    pub verify_after_discount: Decimal,
    /// Users who saw the listing.
    pub exposure_users: i64,
    /// Users who opened the listing.
    pub visit_users: i64,
    /// Users who placed an order.
    pub order_users: i64,
    /// Coupons ordered.
    pub order_coupon_count: i64,
    /// Users whose coupon was verified.
    pub verify_users: i64,
    /// Coupons verified.
    pub verify_coupon_count: i64,
    /// Sale value of orders.
    pub order_sale_amount: Decimal,
    /// Sale value of verified coupons.
    pub verify_sale_amount: Decimal,
    /// Coupon-code orders.
    pub coupon_orders: i64,
    /// Phone number views.
    pub phone_clicks: i64,
    /// Promotion spend.
    pub promotion_cost: Decimal,
    /// Promotion impressions.
    pub promotion_exposure: i64,
    /// Promotion clicks.
    pub promotion_clicks: i64,
    /// Orders attributed to promotion.
    pub promotion_orders: i64,
    /// Deal views from promotion.
    pub view_groupbuy: i64,
    /// Phone views from promotion.
    pub view_phone: i64,
    /// Users who started an online consultation.
    pub consult_users: i64,
    /// Address views.
    pub address_clicks: i64,
    /// New collectors.
    pub new_collect: i64,
    /// New positive reviews.
    pub new_good_reviews: i64,
}

impl PeriodMetrics {
    /// Visits per exposure, percent.
    #[must_use]
    pub fn exposure_visit_rate(&self) -> Decimal {
        metrics::count_rate(self.visit_users, self.exposure_users)
    }

    /// Ordering users per visit, percent.
    #[must_use]
    pub fn order_rate(&self) -> Decimal {
        metrics::count_rate(self.order_users, self.visit_users)
    }

    /// Discounted verified value per verified user.
    #[must_use]
    pub fn avg_price(&self) -> Decimal {
        metrics::average(self.verify_after_discount, self.verify_users)
    }

    /// Promotion spend per click.
    #[must_use]
    pub fn click_price(&self) -> Decimal {
        metrics::average(self.promotion_cost, self.promotion_clicks)
    }

    /// Promotion orders per click, percent.
    #[must_use]
    pub fn promotion_rate(&self) -> Decimal {
        metrics::count_rate(self.promotion_orders, self.promotion_clicks)
    }

    /// New collectors per visit, percent.
    #[must_use]
    pub fn collect_rate(&self) -> Decimal {
        metrics::count_rate(self.new_collect, self.visit_users)
    }

    /// New positive reviews per verified user, percent.
    #[must_use]
    pub fn review_rate(&self) -> Decimal {
        metrics::count_rate(self.new_good_reviews, self.verify_users)
    }

    fn sales_cells(&self) -> Vec<Cell> {
        vec![
            metrics::money(self.verify_after_discount).into(),
            self.exposure_users.into(),
            self.visit_users.into(),
            metrics::format_percent(self.exposure_visit_rate()).into(),
            self.order_users.into(),
            self.order_coupon_count.into(),
            metrics::format_percent(self.order_rate()).into(),
            self.verify_users.into(),
            self.verify_coupon_count.into(),
            metrics::money(self.order_sale_amount).into(),
            metrics::money(self.verify_sale_amount).into(),
            self.coupon_orders.into(),
            self.phone_clicks.into(),
            self.avg_price().into(),
        ]
    }

    fn promotion_cells(&self) -> Vec<Cell> {
        vec![
            metrics::money(self.promotion_cost).into(),
            self.promotion_exposure.into(),
            self.promotion_clicks.into(),
            self.click_price().into(),
            self.promotion_orders.into(),
            metrics::format_percent(self.promotion_rate()).into(),
            self.view_groupbuy.into(),
            self.view_phone.into(),
            self.consult_users.into(),
            self.address_clicks.into(),
            self.new_collect.into(),
            metrics::format_percent(self.collect_rate()).into(),
            self.new_good_reviews.into(),
            metrics::format_percent(self.review_rate()).into(),
        ]
    }
}

/// Second period minus first, field by field.
///
/// Rates and averages are differenced after rounding, so the difference row
/// always matches the two displayed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodDifference<'a> {
    first: &'a PeriodMetrics,
    second: &'a PeriodMetrics,
}

impl PeriodDifference<'_> {
    fn count(&self, field: impl Fn(&PeriodMetrics) -> i64) -> Cell {
        (field(self.second) - field(self.first)).into()
    }

    fn amount(&self, field: impl Fn(&PeriodMetrics) -> Decimal) -> Cell {
        metrics::money(field(self.second) - field(self.first)).into()
    }

    fn rate(&self, field: impl Fn(&PeriodMetrics) -> Decimal) -> Cell {
        metrics::format_percent(field(self.second) - field(self.first)).into()
    }

    fn sales_cells(&self) -> Vec<Cell> {
        vec![
            self.amount(|m| m.verify_after_discount),
            self.count(|m| m.exposure_users),
            self.count(|m| m.visit_users),
            self.rate(PeriodMetrics::exposure_visit_rate),
            self.count(|m| m.order_users),
            self.count(|m| m.order_coupon_count),
            self.rate(PeriodMetrics::order_rate),
            self.count(|m| m.verify_users),
            self.count(|m| m.verify_coupon_count),
            self.amount(|m| m.order_sale_amount),
            self.amount(|m| m.verify_sale_amount),
            self.count(|m| m.coupon_orders),
            self.count(|m| m.phone_clicks),
            self.amount(PeriodMetrics::avg_price),
        ]
    }

    fn promotion_cells(&self) -> Vec<Cell> {
        vec![
            self.amount(|m| m.promotion_cost),
            self.count(|m| m.promotion_exposure),
            self.count(|m| m.promotion_clicks),
            self.amount(PeriodMetrics::click_price),
            self.count(|m| m.promotion_orders),
            self.rate(PeriodMetrics::promotion_rate),
            self.count(|m| m.view_groupbuy),
            self.count(|m| m.view_phone),
            self.count(|m| m.consult_users),
            self.count(|m| m.address_clicks),
            self.count(|m| m.new_collect),
            self.rate(PeriodMetrics::collect_rate),
            self.count(|m| m.new_good_reviews),
            self.rate(PeriodMetrics::review_rate),
        ]
    }
}

/// Per-shop aggregate row returned by the period query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodRow {
    /// Shop id.
    pub shop_id: String,
    /// Shop name within the period.
    pub shop_name: Option<String>,
    /// Aggregated figures.
    pub metrics: PeriodMetrics,
}

/// One shop across both periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopComparison {
    /// Shop id.
    pub shop_id: String,
    /// Name, preferring the second period's.
    pub shop_name: String,
    /// Staff assignment, blank when unknown.
    pub profile: ShopProfile,
    /// Baseline figures; zero when the shop had no rows.
    pub first: PeriodMetrics,
    /// Compared figures; zero when the shop had no rows.
    pub second: PeriodMetrics,
}

impl ShopComparison {
    /// Differences `second - first`.
    #[must_use]
    pub const fn difference(&self) -> PeriodDifference<'_> {
        PeriodDifference {
            first: &self.first,
            second: &self.second,
        }
    }

    /// The eight summary rows of this shop; `seq` is 1-based.
    #[must_use]
    pub fn block(&self, seq: usize, first_label: &str, second_label: &str) -> Vec<SheetRow> {
        let identity: Vec<Cell> = vec![
            seq.into(),
            ShopProfile::or_unknown(&self.profile.operator).into(),
            ShopProfile::or_unknown(&self.profile.city).into(),
            ShopProfile::or_unknown(&self.profile.sales).into(),
            self.shop_name.as_str().into(),
        ];
        let blank_identity = || vec![Cell::Empty; usize::from(IDENTITY_COLUMNS)];
        let row = |style: RowStyle, lead: Vec<Cell>, label: &str, values: Vec<Cell>| {
            let mut cells = lead;
            cells.push(label.into());
            cells.extend(values);
            SheetRow::new(style, cells)
        };
        let diff = self.difference();

        let mut promotion_header = blank_identity();
        promotion_header.extend(PROMOTION_HEADER.iter().map(|h| Cell::from(*h)));

        vec![
            SheetRow::new(
                RowStyle::BlockHeader,
                SALES_HEADER.iter().map(|h| Cell::from(*h)).collect(),
            ),
            row(RowStyle::Data, identity, first_label, self.first.sales_cells()),
            row(RowStyle::Data, blank_identity(), second_label, self.second.sales_cells()),
            row(RowStyle::Difference, blank_identity(), DIFFERENCE_LABEL, diff.sales_cells()),
            SheetRow::new(RowStyle::BlockHeader, promotion_header),
            row(RowStyle::Data, blank_identity(), first_label, self.first.promotion_cells()),
            row(RowStyle::Data, blank_identity(), second_label, self.second.promotion_cells()),
            row(RowStyle::Difference, blank_identity(), DIFFERENCE_LABEL, diff.promotion_cells()),
        ]
    }
}

/// Both periods for every shop that had data in either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Weekly, monthly or custom.
    pub kind: ReportKind,
    /// Baseline period.
    pub first: DateRange,
    /// Compared period.
    pub second: DateRange,
    /// Shops ordered by id.
    pub shops: Vec<ShopComparison>,
}

impl ComparisonReport {
    /// Merges the two period result sets into per-shop comparisons.
    #[must_use]
    pub fn assemble(
        kind: ReportKind,
        first: DateRange,
        second: DateRange,
        first_rows: Vec<PeriodRow>,
        second_rows: Vec<PeriodRow>,
        directory: &ShopDirectory,
    ) -> Self {
        #[derive(Default)]
        struct Pair {
            first: Option<PeriodRow>,
            second: Option<PeriodRow>,
        }

        let mut pairs: BTreeMap<ShopKey, Pair> = BTreeMap::new();
        for row in first_rows {
            let key = ShopKey(row.shop_id.clone());
            pairs.entry(key).or_default().first = Some(row);
        }
        for row in second_rows {
            let key = ShopKey(row.shop_id.clone());
            pairs.entry(key).or_default().second = Some(row);
        }

        let shops = pairs
            .into_iter()
            .map(|(ShopKey(shop_id), pair)| {
                let name = pair
                    .second
                    .as_ref()
                    .and_then(|r| non_blank(r.shop_name.as_deref()))
                    .or_else(|| pair.first.as_ref().and_then(|r| non_blank(r.shop_name.as_deref())))
                    .unwrap_or(UNKNOWN_SHOP)
                    .to_string();
                ShopComparison {
                    profile: directory.profile(&shop_id).cloned().unwrap_or_default(),
                    shop_name: name,
                    first: pair.first.map(|r| r.metrics).unwrap_or_default(),
                    second: pair.second.map(|r| r.metrics).unwrap_or_default(),
                    shop_id,
                }
            })
            .collect();

        Self {
            kind,
            first,
            second,
            shops,
        }
    }

    /// All summary rows, one block per shop.
    #[must_use]
    pub fn summary_rows(&self) -> Vec<SheetRow> {
        let first_label = self.first.label();
        let second_label = self.second.label();
        self.shops
            .iter()
            .enumerate()
            .flat_map(|(i, shop)| shop.block(i + 1, &first_label, &second_label))
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Orders numeric shop ids numerically, anything else lexically after them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShopKey(String);

impl Ord for ShopKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ShopKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
