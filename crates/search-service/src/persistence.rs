//! Catalog snapshot load/save over a [`KeyValueStore`] slot.
//!
//! Reading never fails: a missing, unreadable or corrupt slot is a cache
//! miss and the caller rebuilds from source.

use search_index::{decode_snapshot, encode_snapshot, IndexSnapshot};

use crate::error::ServiceResult;
use crate::storage::KeyValueStore;

/// Reads the snapshot stored under `key`.
pub async fn load_snapshot(store: &dyn KeyValueStore, key: &str) -> Option<IndexSnapshot> {
    let raw = match store.get_item(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!("no cached search index under {key}");
            return None;
        }
        Err(error) => {
            tracing::warn!("failed to read cached search index {key}: {error}");
            return None;
        }
    };

    match decode_snapshot(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            tracing::warn!("ignoring corrupt cached search index {key}: {error}");
            None
        }
    }
}

/// Writes `snapshot` under `key`, replacing any previous value.
pub async fn save_snapshot(
    store: &dyn KeyValueStore,
    key: &str,
    snapshot: &IndexSnapshot,
) -> ServiceResult<()> {
    let raw = encode_snapshot(snapshot)?;
    store.set_item(key, &raw).await?;
    tracing::info!(
        "saved search index snapshot key={} items={} bytes={}",
        key,
        snapshot.items.len(),
        raw.len()
    );
    Ok(())
}
