//! Catalog index snapshots and collection fingerprints.
//!
//! A snapshot carries the flattened prefix index together with the items it
//! was built from, so a later session can restore search without reindexing.
//! Whether a stored snapshot is still usable is decided by comparing a cheap
//! fingerprint of the freshly fetched collection against the one stored in
//! the snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::market::MarketItem;
use crate::types::{CatalogItem, ItemId};

/// Snapshot format version - increment when changing the format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

const FINGERPRINT_PREFIX: &str = "v1";

/// Serializable capture of the catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub format_version: u32,
    pub fingerprint: String,
    pub serialized_index: BTreeMap<String, String>,
    pub items: Vec<(ItemId, CatalogItem)>,
}

/// Anything carrying an item id.
pub trait Identified {
    fn item_id(&self) -> ItemId;
}

impl Identified for CatalogItem {
    fn item_id(&self) -> ItemId {
        self.id
    }
}

impl Identified for MarketItem {
    fn item_id(&self) -> ItemId {
        self.id
    }
}

/// Computes the collection fingerprint from its length and boundary ids.
///
/// Only the count and the first and last ids are looked at, so a change in
/// the middle of an otherwise identical collection is not detected.
pub fn fingerprint<T: Identified>(items: &[T]) -> String {
    fingerprint_parts(
        items.len(),
        items.first().map(Identified::item_id),
        items.last().map(Identified::item_id),
    )
}

pub fn fingerprint_parts(len: usize, first: Option<ItemId>, last: Option<ItemId>) -> String {
    let id = |id: Option<ItemId>| id.map(|id| id.to_string()).unwrap_or_default();
    format!("{FINGERPRINT_PREFIX}_{len}_{}_{}", id(first), id(last))
}

/// Encodes a snapshot for a string store.
pub fn encode_snapshot(snapshot: &IndexSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Decodes a stored snapshot. The format version is not checked here; the
/// engine rejects mismatched versions on import.
pub fn decode_snapshot(raw: &str) -> Result<IndexSnapshot> {
    serde_json::from_str(raw)
        .map_err(|error| IndexError::Serialization(format!("unreadable snapshot: {error}")))
}
