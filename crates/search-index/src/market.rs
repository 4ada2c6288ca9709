//! Market (value tracking) records and their parsed form.
//!
//! Market data arrives as a map from item id string to a compact positional
//! record:
//!
//! ```text
//! [name, acronym, recent_average_price, value, default_value, demand, trend, projected, hyped, rare]
//! ```
//!
//! A `value` of `-1` means "unset". Demand and trend are small enumerations
//! in `-1..=4`; anything outside that range is labelled `Unknown`.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::ItemId;

pub const UNKNOWN_LABEL: &str = "Unknown";

const DEMAND_LABELS: [&str; 6] = ["None", "Terrible", "Low", "Normal", "High", "Amazing"];
const TREND_LABELS: [&str; 6] = [
    "None",
    "Lowering",
    "Unstable",
    "Stable",
    "Raising",
    "Fluctuating",
];

/// Raw positional market record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord(
    pub String,
    pub String,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
    pub i64,
);

/// A parsed market item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketItem {
    pub id: ItemId,
    pub name: String,
    pub acronym: String,
    pub recent_average_price: i64,
    pub value: Option<i64>,
    pub demand: i64,
    pub demand_label: String,
    pub trend: i64,
    pub trend_label: String,
    pub is_projected: bool,
    pub is_hyped: bool,
    pub is_rare: bool,
}

impl MarketItem {
    pub fn from_record(id: ItemId, record: &MarketRecord) -> Self {
        let MarketRecord(
            name,
            acronym,
            recent_average_price,
            value,
            _default_value,
            demand,
            trend,
            projected,
            hyped,
            rare,
        ) = record;

        Self {
            id,
            name: name.clone(),
            acronym: acronym.clone(),
            recent_average_price: *recent_average_price,
            value: (*value != -1).then_some(*value),
            demand: *demand,
            demand_label: demand_label(*demand).to_string(),
            trend: *trend,
            trend_label: trend_label(*trend).to_string(),
            is_projected: *projected == 1,
            is_hyped: *hyped == 1,
            is_rare: *rare == 1,
        }
    }
}

pub fn demand_label(demand: i64) -> &'static str {
    label_for(&DEMAND_LABELS, demand)
}

pub fn trend_label(trend: i64) -> &'static str {
    label_for(&TREND_LABELS, trend)
}

fn label_for(labels: &[&'static str; 6], raw: i64) -> &'static str {
    // Table slot 0 holds the label for -1.
    raw.checked_add(1)
        .and_then(|slot| usize::try_from(slot).ok())
        .and_then(|slot| labels.get(slot).copied())
        .unwrap_or(UNKNOWN_LABEL)
}

/// Parses every record, skipping entries whose key is not a numeric id.
///
/// Items are returned sorted by id so that index order does not depend on
/// hash map iteration order.
pub fn parse_market_records(records: &HashMap<String, MarketRecord>) -> Vec<MarketItem> {
    let mut items: Vec<MarketItem> = records
        .par_iter()
        .filter_map(|(raw_id, record)| match raw_id.trim().parse::<ItemId>() {
            Ok(id) => Some(MarketItem::from_record(id, record)),
            Err(error) => {
                log::warn!("skipping market record with invalid id {raw_id:?}: {error}");
                None
            }
        })
        .collect();
    items.sort_unstable_by_key(|item| item.id);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: i64, demand: i64, trend: i64, flags: [i64; 3]) -> MarketRecord {
        MarketRecord(
            "Dominus Empyreus".to_string(),
            "DE".to_string(),
            18_000_000,
            value,
            -1,
            demand,
            trend,
            flags[0],
            flags[1],
            flags[2],
        )
    }

    #[test]
    fn unset_value_maps_to_none() {
        let item = MarketItem::from_record(1, &record(-1, 2, 2, [0, 0, 0]));
        assert_eq!(item.value, None);

        let item = MarketItem::from_record(1, &record(0, 2, 2, [0, 0, 0]));
        assert_eq!(item.value, Some(0));
    }

    #[test]
    fn labels_cover_full_range() {
        assert_eq!(demand_label(-1), "None");
        assert_eq!(demand_label(0), "Terrible");
        assert_eq!(demand_label(4), "Amazing");
        assert_eq!(trend_label(-1), "None");
        assert_eq!(trend_label(3), "Raising");
        assert_eq!(trend_label(4), "Fluctuating");
    }

    #[test]
    fn out_of_range_labels_are_unknown() {
        assert_eq!(demand_label(5), UNKNOWN_LABEL);
        assert_eq!(demand_label(-2), UNKNOWN_LABEL);
        assert_eq!(trend_label(i64::MAX), UNKNOWN_LABEL);
        assert_eq!(trend_label(i64::MIN), UNKNOWN_LABEL);

        let item = MarketItem::from_record(7, &record(10, 9, -5, [0, 0, 0]));
        assert_eq!(item.demand_label, UNKNOWN_LABEL);
        assert_eq!(item.trend_label, UNKNOWN_LABEL);
        assert_eq!(item.demand, 9);
    }

    #[test]
    fn flags_are_true_only_for_one() {
        let item = MarketItem::from_record(1, &record(10, 1, 1, [1, 2, -1]));
        assert!(item.is_projected);
        assert!(!item.is_hyped);
        assert!(!item.is_rare);

        let item = MarketItem::from_record(1, &record(10, 1, 1, [0, 1, 1]));
        assert!(!item.is_projected);
        assert!(item.is_hyped);
        assert!(item.is_rare);
    }

    #[test]
    fn record_decodes_from_positional_json() {
        let raw = r#"["Domino Crown","",4500000,5000000,5000000,3,2,-1,-1,1]"#;
        let record: MarketRecord = serde_json::from_str(raw).expect("decode");
        let item = MarketItem::from_record(1_081_300, &record);
        assert_eq!(item.name, "Domino Crown");
        assert_eq!(item.acronym, "");
        assert_eq!(item.value, Some(5_000_000));
        assert_eq!(item.demand_label, "High");
        assert_eq!(item.trend_label, "Stable");
        assert!(item.is_rare);
    }

    #[test]
    fn parse_skips_invalid_ids_and_sorts() {
        let mut records = HashMap::new();
        records.insert("30".to_string(), record(1, 0, 0, [0, 0, 0]));
        records.insert("abc".to_string(), record(1, 0, 0, [0, 0, 0]));
        records.insert("4".to_string(), record(1, 0, 0, [0, 0, 0]));

        let items = parse_market_records(&records);
        let ids: Vec<_> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![4, 30]);
    }
}
