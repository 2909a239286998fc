//! Daily report model and sheet layout.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use super::directory::{RegionInfo, ShopDirectory, ShopProfile};
use super::metrics::{
    self, AD_ORDERS_TARGET, COLLECT_RATE_TARGET, COUPON_ORDERS_TARGET, REVIEW_RATE_TARGET,
};
use super::sheet::{Cell, RowStyle, SheetRow};

const WEEKDAYS: [&str; 7] = ["周一", "周二", "周三", "周四", "周五", "周六", "周日"];

/// Summary sheet headers.
pub const SUMMARY_HEADERS: [&str; 23] = [
    "星期",
    "日期",
    "序号",
    "运营",
    "城市",
    "销售",
    "门店",
    "曝光人数",
    "访问人数",
    "下单人数",
    "核销人数",
    "下单券数",
    "核销券数",
    "电话点击",
    "地址点击",
    "推广通消耗",
    "好评",
    "意向转化率",
    "下单售价金额",
    "核销售价金额",
    "优惠后核销金额",
    "下单人数商圈排名",
    "核销金额商圈排名",
];

/// Summary sheet column widths.
pub const SUMMARY_WIDTHS: [u16; 23] = [
    6, 8, 5, 12, 8, 8, 46, 10, 10, 10, 10, 10, 10, 10, 10, 12, 8, 12, 12, 12, 12, 14, 14,
];

/// Detail sheet column widths.
pub const DETAIL_WIDTHS: [u16; 3] = [40, 30, 15];

/// One shop's figures for the report day.
///
/// Missing joins (no promotion or stats row) read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyShopMetrics {
    /// Shop id.
    pub shop_id: String,
    /// Shop name as reported by the platform.
    pub shop_name: Option<String>,
    /// Users who saw the listing.
    pub exposure_users: i64,
    /// Users who opened the listing.
    pub visit_users: i64,
    /// Users who placed an order.
    pub order_users: i64,
    /// Users whose coupon was verified.
    pub verify_users: i64,
    /// Coupons ordered.
    pub order_coupon_count: i64,
    /// Coupons verified.
    pub verify_coupon_count: i64,
    /// Promotion spend.
    pub promotion_cost: Decimal,
    /// New positive reviews.
    pub new_good_review_count: i64,
    /// New reviews of any rating.
    pub new_review_count: i64,
    /// New users who collected the shop.
    pub new_collect_users: i64,
    /// Users who started an online consultation.
    pub consult_users: i64,
    /// Intent conversion rate as published by the platform.
    pub intent_rate: Option<String>,
    /// Sale value of orders.
    pub order_sale_amount: Decimal,
    /// Sale value of verified coupons.
    pub verify_sale_amount: Decimal,
    /// Verified value after discounts.
    pub verify_after_discount: Decimal,
    /// Phone number views.
    pub phone_clicks: i64,
    /// Address views.
    pub address_clicks: i64,
    /// Average promotion click price.
    pub click_avg_price: Decimal,
    /// Orders attributed to promotion.
    pub promotion_order_count: i64,
    /// Trade-area rank by ordering users.
    pub order_user_rank: Option<i64>,
    /// Trade-area rank by verified amount.
    pub verify_amount_rank: Option<i64>,
    /// New check-ins.
    pub checkin_count: i64,
    /// Remaining promotion balance.
    pub ad_balance: Decimal,
    /// Ad orders on the day.
    pub ad_order_count: i64,
    /// Deals forced offline by the platform.
    pub force_offline_count: i64,
}

/// A shop row joined with its directory entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyShopEntry {
    /// Day figures.
    pub metrics: DailyShopMetrics,
    /// Staff assignment, blank when unknown.
    pub profile: ShopProfile,
    /// Ranking regions.
    pub region: Option<RegionInfo>,
    /// Coupon orders over the seven days ending on the report day.
    pub coupon_orders_7d: i64,
}

/// Result of one target check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Row caption.
    pub label: &'static str,
    /// Displayed value.
    pub value: Cell,
    /// Whether the target was met.
    pub passed: bool,
}

impl DailyShopEntry {
    /// Shop name, falling back to `门店<id>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.metrics.shop_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("门店{}", self.metrics.shop_id),
        }
    }

    /// New reviews per verified user, in percent.
    #[must_use]
    pub fn review_rate(&self) -> Decimal {
        metrics::percent(
            Decimal::from(self.metrics.new_review_count),
            Decimal::from(self.metrics.verify_users),
        )
    }

    /// New collectors per ordering user, in percent.
    #[must_use]
    pub fn collect_rate(&self) -> Decimal {
        metrics::percent(
            Decimal::from(self.metrics.new_collect_users),
            Decimal::from(self.metrics.order_users),
        )
    }

    /// The four target checks in sheet order.
    #[must_use]
    pub fn checks(&self) -> [Check; 4] {
        let review = self.review_rate();
        let collect = self.collect_rate();
        let ad_orders = self.metrics.ad_order_count;
        [
            Check {
                label: "留评率（30%达标）：",
                value: metrics::format_percent(review).into(),
                passed: review >= REVIEW_RATE_TARGET,
            },
            Check {
                label: "收藏率（40%达标）：",
                value: metrics::format_percent(collect).into(),
                passed: collect >= COLLECT_RATE_TARGET,
            },
            Check {
                label: "近7天优惠码订单是否达标：",
                value: self.coupon_orders_7d.into(),
                passed: self.coupon_orders_7d >= COUPON_ORDERS_TARGET,
            },
            Check {
                label: "广告单：",
                value: format!("当天{ad_orders}单").into(),
                passed: ad_orders >= AD_ORDERS_TARGET,
            },
        ]
    }

    /// Compliance line shown next to the shop name.
    #[must_use]
    pub fn status_line(&self) -> String {
        let offline = self.metrics.force_offline_count;
        if offline > 0 {
            format!("警告：有{offline}个团单被强制下线！")
        } else {
            "今天邮件已查看，无违规无异常。".to_string()
        }
    }

    /// Trade area used in rank lines.
    ///
    /// The full hierarchy when a business area is known, otherwise the city.
    #[must_use]
    pub fn area_label(&self) -> String {
        match &self.region {
            Some(region) if !region.business.is_empty() => {
                let city = if region.city.is_empty() {
                    &self.profile.city
                } else {
                    &region.city
                };
                format!("{city} | {} | {}", region.district, region.business)
            }
            _ => self.profile.city.clone(),
        }
    }

    /// Summary sheet row; `seq` is 1-based.
    #[must_use]
    pub fn summary_row(&self, date: NaiveDate, seq: usize) -> SheetRow {
        let m = &self.metrics;
        SheetRow::data(vec![
            weekday_name(date).into(),
            date.format("%m月%d日").to_string().into(),
            seq.into(),
            self.profile.operator.as_str().into(),
            self.profile.city.as_str().into(),
            self.profile.sales.as_str().into(),
            self.display_name().into(),
            m.exposure_users.into(),
            m.visit_users.into(),
            m.order_users.into(),
            m.verify_users.into(),
            m.order_coupon_count.into(),
            m.verify_coupon_count.into(),
            m.phone_clicks.into(),
            m.address_clicks.into(),
            metrics::money(m.promotion_cost).into(),
            m.new_good_review_count.into(),
            intent_rate(m.intent_rate.as_deref()).into(),
            metrics::money(m.order_sale_amount).into(),
            metrics::money(m.verify_sale_amount).into(),
            metrics::money(m.verify_after_discount).into(),
            metrics::rank_label(m.order_user_rank).into(),
            metrics::rank_label(m.verify_amount_rank).into(),
        ])
    }

    /// Detail sheet rows.
    #[must_use]
    pub fn detail_rows(&self, date: NaiveDate) -> Vec<SheetRow> {
        let m = &self.metrics;
        let area = self.area_label();
        let line = |label: &str, value: Cell| SheetRow::data(vec![label.into(), value]);
        let section = |label: &str| SheetRow::new(RowStyle::Section, vec![label.into()]);

        let mut rows = vec![
            SheetRow::new(
                RowStyle::Title {
                    alert: m.force_offline_count > 0,
                },
                vec![self.display_name().into(), self.status_line().into()],
            ),
            SheetRow::data(vec![
                "数据报表".into(),
                format!("日期({})", date.format("%m/%d")).into(),
            ]),
            section("【美团点评广告结果数据】"),
            line("曝光人数：", m.exposure_users.into()),
            line("访问人数：", m.visit_users.into()),
            line("下单人数：", m.order_users.into()),
            line("下单券数：", m.order_coupon_count.into()),
            line("核销人数：", m.verify_users.into()),
            line("核销券数：", m.verify_coupon_count.into()),
            line("电话点击：", m.phone_clicks.into()),
            line("地址点击：", m.address_clicks.into()),
            line("在线咨询：", m.consult_users.into()),
            SheetRow::blank(),
            section("【店内干预数据】"),
            line("新增收藏：", m.new_collect_users.into()),
            line("新增打卡：", m.checkin_count.into()),
            line("新增评价：", m.new_review_count.into()),
            SheetRow::blank(),
            section("【推广通数据】"),
            line("推广通消耗：", metrics::money(m.promotion_cost).into()),
            line("推广通点击单价：", metrics::money(m.click_avg_price).into()),
            line("推广通下单量：", m.promotion_order_count.into()),
            line("推广通余额：", metrics::money(m.ad_balance).into()),
            SheetRow::blank(),
        ];

        rows.extend(self.checks().into_iter().map(|check| {
            SheetRow::new(
                RowStyle::Check {
                    passed: check.passed,
                },
                vec![
                    check.label.into(),
                    check.value,
                    metrics::qualification(check.passed).into(),
                ],
            )
        }));

        rows.extend([
            SheetRow::blank(),
            line("下单售价金额：", metrics::money(m.order_sale_amount).into()),
            line("核销售价金额：", metrics::money(m.verify_sale_amount).into()),
            line(
                "下单人数商圈排名：",
                metrics::rank_with_area(&area, m.order_user_rank).into(),
            ),
            line(
                "核销金额商圈排名：",
                metrics::rank_with_area(&area, m.verify_amount_rank).into(),
            ),
            SheetRow::blank(),
            line("团单被强制下线数量：", m.force_offline_count.into()),
            SheetRow::blank(),
            line("运营：", self.profile.operator.as_str().into()),
            line("销售：", self.profile.sales.as_str().into()),
            line("城市：", self.profile.city.as_str().into()),
        ]);

        rows
    }
}

/// All shops reported for one day, ordered by shop id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    /// Report day.
    pub date: NaiveDate,
    /// Shop entries.
    pub shops: Vec<DailyShopEntry>,
}

impl DailyReport {
    /// Joins day rows with the directory and trailing coupon totals.
    #[must_use]
    pub fn assemble<F>(
        date: NaiveDate,
        rows: Vec<DailyShopMetrics>,
        directory: &ShopDirectory,
        coupon_orders_7d: F,
    ) -> Self
    where
        F: Fn(&str) -> i64,
    {
        let shops = rows
            .into_iter()
            .map(|metrics| DailyShopEntry {
                profile: directory
                    .profile(&metrics.shop_id)
                    .cloned()
                    .unwrap_or_default(),
                region: directory.region(&metrics.shop_id).cloned(),
                coupon_orders_7d: coupon_orders_7d(&metrics.shop_id),
                metrics,
            })
            .collect();
        Self { date, shops }
    }

    /// Header row of the summary sheet.
    #[must_use]
    pub fn summary_header() -> SheetRow {
        SheetRow::new(
            RowStyle::Header,
            SUMMARY_HEADERS.iter().map(|h| Cell::from(*h)).collect(),
        )
    }

    /// First day of the trailing coupon window, clamped at the earliest date.
    #[must_use]
    pub fn coupon_window_start(date: NaiveDate) -> NaiveDate {
        date.checked_sub_days(chrono::Days::new(6)).unwrap_or(NaiveDate::MIN)
    }
}

/// Chinese weekday name.
#[must_use]
pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAYS[date.weekday().num_days_from_monday() as usize]
}

fn intent_rate(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(rate) if !rate.is_empty() => rate.to_string(),
        _ => "0%".to_string(),
    }
}
