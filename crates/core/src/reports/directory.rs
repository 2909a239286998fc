//! Shop directory built from platform account records.
//!
//! Accounts carry two JSON documents: the list of shops they own and the
//! trade-area hierarchy each shop is ranked in. Documents that fail to parse
//! are skipped with a warning; one bad account never fails a report.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::warn;

/// Placeholder for profile fields the directory has no value for.
pub const UNKNOWN: &str = "--";

/// One `platform_accounts` row as read from the database.
#[derive(Debug, Clone, Default)]
pub struct AccountRecord {
    /// Account login.
    pub account: String,
    /// JSON list of `{ "shop_id": ... }` objects.
    pub stores_json: Option<String>,
    /// Assigned salesperson.
    pub sales_name: Option<String>,
    /// City the account is managed from.
    pub city_name: Option<String>,
    /// Operator display name.
    pub operator_name: Option<String>,
    /// JSON object mapping shop id to its ranking regions.
    pub regions_json: Option<String>,
}

/// Staff and city assignment of a shop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopProfile {
    /// Operator display name.
    pub operator: String,
    /// Salesperson.
    pub sales: String,
    /// City.
    pub city: String,
}

impl ShopProfile {
    /// Field value or [`UNKNOWN`] when blank.
    #[must_use]
    pub fn or_unknown(value: &str) -> &str {
        if value.is_empty() { UNKNOWN } else { value }
    }
}

/// Trade-area hierarchy a shop is ranked in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionInfo {
    /// City region name.
    pub city: String,
    /// District region name.
    pub district: String,
    /// Business-area region name.
    pub business: String,
}

/// Profiles and regions keyed by shop id.
#[derive(Debug, Clone, Default)]
pub struct ShopDirectory {
    profiles: HashMap<String, ShopProfile>,
    regions: HashMap<String, RegionInfo>,
}

impl ShopDirectory {
    /// Builds the directory from account records.
    ///
    /// A shop listed by several accounts takes the profile of the last one.
    #[must_use]
    pub fn from_accounts<I>(records: I) -> Self
    where
        I: IntoIterator<Item = AccountRecord>,
    {
        let mut directory = Self::default();

        for record in records {
            if let Some(stores) = record.stores_json.as_deref() {
                let profile = ShopProfile {
                    operator: record.operator_name.clone().unwrap_or_default(),
                    sales: record.sales_name.clone().unwrap_or_default(),
                    city: record.city_name.clone().unwrap_or_default(),
                };
                for shop_id in parse_store_ids(&record.account, stores) {
                    directory.profiles.insert(shop_id, profile.clone());
                }
            }

            if let Some(regions) = record.regions_json.as_deref() {
                directory
                    .regions
                    .extend(parse_regions(&record.account, regions));
            }
        }

        directory
    }

    /// Ids of every shop listed by the loaded accounts.
    #[must_use]
    pub fn shop_ids(&self) -> BTreeSet<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Profile of a shop.
    #[must_use]
    pub fn profile(&self, shop_id: &str) -> Option<&ShopProfile> {
        self.profiles.get(shop_id)
    }

    /// Ranking regions of a shop.
    #[must_use]
    pub fn region(&self, shop_id: &str) -> Option<&RegionInfo> {
        self.regions.get(shop_id)
    }

    /// Number of shops with a profile.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no account listed any shop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Extracts shop ids from a `stores_json` document.
///
/// Ids may be JSON strings or numbers; anything else is ignored.
#[must_use]
pub fn parse_store_ids(account: &str, json: &str) -> Vec<String> {
    let stores: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(account, error = %e, "Skipping malformed stores_json");
            return Vec::new();
        }
    };

    let Some(stores) = stores.as_array() else {
        warn!(account, "stores_json is not a list");
        return Vec::new();
    };

    stores
        .iter()
        .filter_map(|store| store.get("shop_id"))
        .filter_map(id_to_string)
        .collect()
}

/// Extracts `shop id -> regions` from a `compareRegions_json` document.
#[must_use]
pub fn parse_regions(account: &str, json: &str) -> Vec<(String, RegionInfo)> {
    let document: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(account, error = %e, "Skipping malformed compareRegions_json");
            return Vec::new();
        }
    };

    let Some(shops) = document.as_object() else {
        warn!(account, "compareRegions_json is not an object");
        return Vec::new();
    };

    shops
        .iter()
        .filter_map(|(shop_id, entry)| {
            let regions = entry.get("regions")?.as_object()?;
            let name = |level: &str| {
                regions
                    .get(level)
                    .and_then(|r| r.get("regionName"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Some((
                shop_id.clone(),
                RegionInfo {
                    city: name("city"),
                    district: name("district"),
                    business: name("business"),
                },
            ))
        })
        .collect()
}

fn id_to_string(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(stores: &str, regions: Option<&str>) -> AccountRecord {
        AccountRecord {
            account: "13718175572a".into(),
            stores_json: Some(stores.into()),
            sales_name: Some("王五".into()),
            city_name: Some("杭州".into()),
            operator_name: Some("张三".into()),
            regions_json: regions.map(Into::into),
        }
    }

    #[test]
    fn test_store_ids_accept_numbers_and_strings() {
        let ids = parse_store_ids(
            "a",
            r#"[{"shop_id": 1001}, {"shop_id": "1002"}, {"shop_id": ""}, {"name": "x"}, {"shop_id": null}]"#,
        );
        assert_eq!(ids, vec!["1001".to_string(), "1002".to_string()]);
    }

    #[test]
    fn test_malformed_stores_are_skipped() {
        assert!(parse_store_ids("a", "not json").is_empty());
        assert!(parse_store_ids("a", r#"{"shop_id": 1}"#).is_empty());
    }

    #[test]
    fn test_regions_parsed_with_missing_levels() {
        let regions = parse_regions(
            "a",
            r#"{
                "1001": {"regions": {"city": {"regionName": "杭州"}, "district": {"regionName": "西湖区"}, "business": {"regionName": "湖滨"}}},
                "1002": {"regions": {"city": {"regionName": "宁波"}}},
                "1003": {"other": true}
            }"#,
        );
        let map: HashMap<_, _> = regions.into_iter().collect();

        assert_eq!(map.len(), 2);
        assert_eq!(map["1001"].business, "湖滨");
        assert_eq!(map["1002"].city, "宁波");
        assert_eq!(map["1002"].district, "");
    }

    #[test]
    fn test_directory_collects_profiles_and_regions() {
        let directory = ShopDirectory::from_accounts(vec![
            account(
                r#"[{"shop_id": 1001}, {"shop_id": 1002}]"#,
                Some(r#"{"1001": {"regions": {"city": {"regionName": "杭州"}}}}"#),
            ),
            AccountRecord {
                stores_json: Some("{broken".into()),
                ..account("", None)
            },
        ]);

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.profile("1001").unwrap().operator, "张三");
        assert_eq!(directory.region("1001").unwrap().city, "杭州");
        assert!(directory.region("1002").is_none());
        assert!(directory.profile("9999").is_none());
        assert_eq!(
            directory.shop_ids().into_iter().collect::<Vec<_>>(),
            vec!["1001", "1002"]
        );
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(ShopProfile::or_unknown(""), UNKNOWN);
        assert_eq!(ShopProfile::or_unknown("李四"), "李四");
    }
}
