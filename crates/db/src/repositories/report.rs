//! Report queries over the store statistics tables.
//!
//! Every query runs on one leased connection. Numeric columns are cast in
//! SQL so rows decode into fixed Rust types whatever the column's storage
//! type, and missing joins read as zero.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlConnection;
use sqlx::{FromRow, MySql, QueryBuilder};

use jxreport_core::reports::{
    AccountRecord, DailyShopMetrics, DateRange, PeriodMetrics, PeriodRow, ReportError,
};

/// Maps a driver error onto the report error taxonomy.
///
/// Transport failures mean the connection is gone and the work may be
/// retried on a fresh one; everything else is a query failure.
pub fn classify(err: sqlx::Error) -> ReportError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => ReportError::ConnectionLost(err.to_string()),
        other => ReportError::Query(other.to_string()),
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    account: String,
    stores_json: Option<String>,
    sales_name: Option<String>,
    city_name: Option<String>,
    operator_name: Option<String>,
    regions_json: Option<String>,
}

impl From<AccountRow> for AccountRecord {
    fn from(row: AccountRow) -> Self {
        Self {
            account: row.account,
            stores_json: row.stores_json,
            sales_name: row.sales_name,
            city_name: row.city_name,
            operator_name: row.operator_name,
            regions_json: row.regions_json,
        }
    }
}

#[derive(Debug, FromRow)]
struct DailyRow {
    shop_id: String,
    shop_name: Option<String>,
    exposure_users: i64,
    visit_users: i64,
    order_users: i64,
    verify_users: i64,
    order_coupon_count: i64,
    verify_coupon_count: i64,
    promotion_cost: Decimal,
    new_good_review_count: i64,
    new_review_count: i64,
    new_collect_users: i64,
    consult_users: i64,
    intent_rate: Option<String>,
    order_sale_amount: Decimal,
    verify_sale_amount: Decimal,
    verify_after_discount: Decimal,
    phone_clicks: i64,
    address_clicks: i64,
    click_avg_price: Decimal,
    promotion_order_count: i64,
    order_user_rank: Option<i64>,
    verify_amount_rank: Option<i64>,
    checkin_count: i64,
    ad_balance: Decimal,
    ad_order_count: i64,
    force_offline_count: i64,
}

impl From<DailyRow> for DailyShopMetrics {
    fn from(row: DailyRow) -> Self {
        Self {
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            exposure_users: row.exposure_users,
            visit_users: row.visit_users,
            order_users: row.order_users,
            verify_users: row.verify_users,
            order_coupon_count: row.order_coupon_count,
            verify_coupon_count: row.verify_coupon_count,
            promotion_cost: row.promotion_cost,
            new_good_review_count: row.new_good_review_count,
            new_review_count: row.new_review_count,
            new_collect_users: row.new_collect_users,
            consult_users: row.consult_users,
            intent_rate: row.intent_rate,
            order_sale_amount: row.order_sale_amount,
            verify_sale_amount: row.verify_sale_amount,
            verify_after_discount: row.verify_after_discount,
            phone_clicks: row.phone_clicks,
            address_clicks: row.address_clicks,
            click_avg_price: row.click_avg_price,
            promotion_order_count: row.promotion_order_count,
            order_user_rank: row.order_user_rank,
            verify_amount_rank: row.verify_amount_rank,
            checkin_count: row.checkin_count,
            ad_balance: row.ad_balance,
            ad_order_count: row.ad_order_count,
            force_offline_count: row.force_offline_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct PeriodSqlRow {
    shop_id: String,
    shop_name: Option<String>,
    verify_after_discount: Decimal,
    exposure_users: i64,
    visit_users: i64,
    order_users: i64,
    order_coupon_count: i64,
    verify_users: i64,
    verify_coupon_count: i64,
    order_sale_amount: Decimal,
    verify_sale_amount: Decimal,
    coupon_orders: i64,
    phone_clicks: i64,
    promotion_cost: Decimal,
    promotion_exposure: i64,
    promotion_clicks: i64,
    promotion_orders: i64,
    view_groupbuy: i64,
    view_phone: i64,
    consult_users: i64,
    address_clicks: i64,
    new_collect: i64,
    new_good_reviews: i64,
}

impl From<PeriodSqlRow> for PeriodRow {
    fn from(row: PeriodSqlRow) -> Self {
        Self {
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            metrics: PeriodMetrics {
                verify_after_discount: row.verify_after_discount,
                exposure_users: row.exposure_users,
                visit_users: row.visit_users,
                order_users: row.order_users,
                order_coupon_count: row.order_coupon_count,
                verify_users: row.verify_users,
                verify_coupon_count: row.verify_coupon_count,
                order_sale_amount: row.order_sale_amount,
                verify_sale_amount: row.verify_sale_amount,
                coupon_orders: row.coupon_orders,
                phone_clicks: row.phone_clicks,
                promotion_cost: row.promotion_cost,
                promotion_exposure: row.promotion_exposure,
                promotion_clicks: row.promotion_clicks,
                promotion_orders: row.promotion_orders,
                view_groupbuy: row.view_groupbuy,
                view_phone: row.view_phone,
                consult_users: row.consult_users,
                address_clicks: row.address_clicks,
                new_collect: row.new_collect,
                new_good_reviews: row.new_good_reviews,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct CouponTotal {
    shop_id: String,
    total: i64,
}

const ACCOUNTS_SQL: &str = "\
SELECT pa.account AS account, \
       CAST(pa.stores_json AS CHAR) AS stores_json, \
       pa.sales_name AS sales_name, \
       pa.city_name AS city_name, \
       su.name AS operator_name, \
       CAST(pa.compareRegions_json AS CHAR) AS regions_json \
FROM platform_accounts pa \
LEFT JOIN saas_users su ON pa.operator_id = su.id \
WHERE (pa.stores_json IS NOT NULL OR pa.compareRegions_json IS NOT NULL)";

const DAILY_SQL: &str = "\
SELECT CAST(k.shop_id AS CHAR) AS shop_id, \
       k.shop_name AS shop_name, \
       CAST(COALESCE(k.exposure_users, 0) AS SIGNED) AS exposure_users, \
       CAST(COALESCE(k.visit_users, 0) AS SIGNED) AS visit_users, \
       CAST(COALESCE(k.order_users, 0) AS SIGNED) AS order_users, \
       CAST(COALESCE(k.verify_person_count, 0) AS SIGNED) AS verify_users, \
       CAST(COALESCE(k.order_coupon_count, 0) AS SIGNED) AS order_coupon_count, \
       CAST(COALESCE(k.verify_coupon_count, 0) AS SIGNED) AS verify_coupon_count, \
       CAST(COALESCE(k.promotion_cost, 0) AS DECIMAL(18, 4)) AS promotion_cost, \
       CAST(COALESCE(k.new_good_review_count, 0) AS SIGNED) AS new_good_review_count, \
       CAST(COALESCE(k.new_review_count, 0) AS SIGNED) AS new_review_count, \
       CAST(COALESCE(k.new_collect_users, 0) AS SIGNED) AS new_collect_users, \
       CAST(COALESCE(k.consult_users, 0) AS SIGNED) AS consult_users, \
       CAST(k.intent_rate AS CHAR) AS intent_rate, \
       CAST(COALESCE(k.order_sale_amount, 0) AS DECIMAL(18, 4)) AS order_sale_amount, \
       CAST(COALESCE(k.verify_sale_amount, 0) AS DECIMAL(18, 4)) AS verify_sale_amount, \
       CAST(COALESCE(k.verify_after_discount, 0) AS DECIMAL(18, 4)) AS verify_after_discount, \
       CAST(COALESCE(p.view_phone_count, 0) AS SIGNED) AS phone_clicks, \
       CAST(COALESCE(p.view_address_count, 0) AS SIGNED) AS address_clicks, \
       CAST(COALESCE(p.click_avg_price, 0) AS DECIMAL(18, 4)) AS click_avg_price, \
       CAST(COALESCE(p.order_count, 0) AS SIGNED) AS promotion_order_count, \
       CAST(s.order_user_rank AS SIGNED) AS order_user_rank, \
       CAST(s.verify_amount_rank AS SIGNED) AS verify_amount_rank, \
       CAST(COALESCE(s.checkin_count, 0) AS SIGNED) AS checkin_count, \
       CAST(COALESCE(s.ad_balance, 0) AS DECIMAL(18, 4)) AS ad_balance, \
       CAST(COALESCE(s.ad_order_count, 0) AS SIGNED) AS ad_order_count, \
       CAST(COALESCE(s.is_force_offline, 0) AS SIGNED) AS force_offline_count \
FROM kewen_daily_report k \
LEFT JOIN promotion_daily_report p ON k.shop_id = p.shop_id AND k.report_date = p.report_date \
LEFT JOIN store_stats s ON k.shop_id = s.store_id AND k.report_date = s.date \
WHERE k.report_date = ";

const PERIOD_SQL: &str = "\
SELECT CAST(k.shop_id AS CHAR) AS shop_id, \
       MAX(k.shop_name) AS shop_name, \
       CAST(COALESCE(SUM(k.verify_after_discount), 0) AS DECIMAL(18, 4)) AS verify_after_discount, \
       CAST(COALESCE(SUM(k.exposure_users), 0) AS SIGNED) AS exposure_users, \
       CAST(COALESCE(SUM(k.visit_users), 0) AS SIGNED) AS visit_users, \
       CAST(COALESCE(SUM(k.order_users), 0) AS SIGNED) AS order_users, \
       CAST(COALESCE(SUM(k.order_coupon_count), 0) AS SIGNED) AS order_coupon_count, \
       CAST(COALESCE(SUM(k.verify_person_count), 0) AS SIGNED) AS verify_users, \
       CAST(COALESCE(SUM(k.verify_coupon_count), 0) AS SIGNED) AS verify_coupon_count, \
       CAST(COALESCE(SUM(k.order_sale_amount), 0) AS DECIMAL(18, 4)) AS order_sale_amount, \
       CAST(COALESCE(SUM(k.verify_sale_amount), 0) AS DECIMAL(18, 4)) AS verify_sale_amount, \
       CAST(COALESCE(SUM(k.coupon_pay_order_count), 0) AS SIGNED) AS coupon_orders, \
       CAST(COALESCE(SUM(p.view_phone_count), 0) AS SIGNED) AS phone_clicks, \
       CAST(COALESCE(SUM(k.promotion_cost), 0) AS DECIMAL(18, 4)) AS promotion_cost, \
       CAST(COALESCE(SUM(k.promotion_exposure_count), 0) AS SIGNED) AS promotion_exposure, \
       CAST(COALESCE(SUM(k.promotion_click_count), 0) AS SIGNED) AS promotion_clicks, \
       CAST(COALESCE(SUM(p.order_count), 0) AS SIGNED) AS promotion_orders, \
       CAST(COALESCE(SUM(p.view_groupbuy_count), 0) AS SIGNED) AS view_groupbuy, \
       CAST(COALESCE(SUM(p.view_phone_count), 0) AS SIGNED) AS view_phone, \
       CAST(COALESCE(SUM(k.consult_users), 0) AS SIGNED) AS consult_users, \
       CAST(COALESCE(SUM(p.view_address_count), 0) AS SIGNED) AS address_clicks, \
       CAST(COALESCE(SUM(k.new_collect_users), 0) AS SIGNED) AS new_collect, \
       CAST(COALESCE(SUM(k.new_good_review_count), 0) AS SIGNED) AS new_good_reviews \
FROM kewen_daily_report k \
LEFT JOIN promotion_daily_report p ON k.shop_id = p.shop_id AND k.report_date = p.report_date \
WHERE k.report_date BETWEEN ";

/// Report queries bound to one connection.
#[derive(Debug)]
pub struct ReportRepository<'c> {
    conn: &'c mut MySqlConnection,
}

impl<'c> ReportRepository<'c> {
    /// Wraps a leased connection.
    pub fn new(conn: &'c mut MySqlConnection) -> Self {
        Self { conn }
    }

    /// Account records, optionally limited to the given logins.
    pub async fn accounts(&mut self, accounts: &[&str]) -> Result<Vec<AccountRecord>, ReportError> {
        let mut builder = QueryBuilder::<MySql>::new(ACCOUNTS_SQL);
        push_in_list(&mut builder, " AND pa.account IN ", accounts);

        let rows: Vec<AccountRow> = builder
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// One row per shop reporting on `date`, ordered by shop id.
    pub async fn daily_rows(
        &mut self,
        date: NaiveDate,
        shop_ids: Option<&[&str]>,
    ) -> Result<Vec<DailyShopMetrics>, ReportError> {
        let mut builder = QueryBuilder::<MySql>::new(DAILY_SQL);
        builder.push_bind(date);
        if let Some(ids) = shop_ids {
            push_in_list(&mut builder, " AND k.shop_id IN ", ids);
        }
        builder.push(" ORDER BY k.shop_id");

        let rows: Vec<DailyRow> = builder
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Coupon orders per shop between `start` and `end` inclusive.
    pub async fn coupon_orders(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        shop_ids: &[&str],
    ) -> Result<HashMap<String, i64>, ReportError> {
        if shop_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder = QueryBuilder::<MySql>::new(
            "SELECT CAST(shop_id AS CHAR) AS shop_id, \
             CAST(COALESCE(SUM(coupon_pay_order_count), 0) AS SIGNED) AS total \
             FROM kewen_daily_report WHERE report_date BETWEEN ",
        );
        builder.push_bind(start);
        builder.push(" AND ");
        builder.push_bind(end);
        push_in_list(&mut builder, " AND shop_id IN ", shop_ids);
        builder.push(" GROUP BY shop_id");

        let rows: Vec<CouponTotal> = builder
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(|r| (r.shop_id, r.total)).collect())
    }

    /// Per-shop totals over `range`.
    pub async fn period_rows(
        &mut self,
        range: DateRange,
        shop_ids: Option<&[&str]>,
    ) -> Result<Vec<PeriodRow>, ReportError> {
        let mut builder = QueryBuilder::<MySql>::new(PERIOD_SQL);
        builder.push_bind(range.start());
        builder.push(" AND ");
        builder.push_bind(range.end());
        if let Some(ids) = shop_ids {
            push_in_list(&mut builder, " AND k.shop_id IN ", ids);
        }
        builder.push(" GROUP BY k.shop_id ORDER BY k.shop_id");

        let rows: Vec<PeriodSqlRow> = builder
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Appends `<prefix>(?, ?, ...)`; does nothing for an empty list.
fn push_in_list<'args>(builder: &mut QueryBuilder<'args, MySql>, prefix: &str, values: &[&'args str]) {
    if values.is_empty() {
        return;
    }
    builder.push(prefix).push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(*value);
    }
    separated.push_unseparated(")");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_mean_connection_lost() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(classify(err).is_connection_lost());
    }

    #[test]
    fn test_other_errors_are_query_failures() {
        let err = classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, ReportError::Query(_)));
        assert!(!err.is_connection_lost());
    }

    #[test]
    fn test_in_list_renders_placeholders() {
        let mut builder = QueryBuilder::<MySql>::new("SELECT 1 FROM t WHERE 1 = 1");
        push_in_list(&mut builder, " AND id IN ", &["1", "2", "3"]);
        assert_eq!(builder.sql(), "SELECT 1 FROM t WHERE 1 = 1 AND id IN (?, ?, ?)");
    }

    #[test]
    fn test_empty_in_list_is_skipped() {
        let mut builder = QueryBuilder::<MySql>::new("SELECT 1");
        push_in_list(&mut builder, " AND id IN ", &[]);
        assert_eq!(builder.sql(), "SELECT 1");
    }
}
