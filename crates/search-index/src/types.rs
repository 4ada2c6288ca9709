//! Item and status types shared by the engine, the snapshot codec and the
//! message protocol.

use serde::{Deserialize, Serialize};

/// Identifier shared by catalog and market items.
pub type ItemId = u64;

/// A catalog row as delivered by the catalog fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: u32,
    #[serde(default)]
    pub is_limited: bool,
    #[serde(default)]
    pub is_limited_unique: bool,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub is_for_sale: bool,
}

impl CatalogItem {
    /// Builds an item with only an id and a name; the rest is defaulted.
    pub fn named(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            category_id: 0,
            is_limited: false,
            is_limited_unique: false,
            price: None,
            is_for_sale: false,
        }
    }
}

/// Readiness of both collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub catalog_ready: bool,
    pub market_ready: bool,
    pub catalog_count: usize,
    pub market_count: usize,
}
