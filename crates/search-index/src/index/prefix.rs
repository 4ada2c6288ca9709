//! Forward prefix index.
//!
//! Every word of an indexed text is registered under each of its prefixes,
//! so a query word matches any indexed word it is a prefix of. Postings keep
//! insertion order; search results come back in that order.

use std::collections::BTreeMap;

use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};
use thin_vec::ThinVec;

use super::tokenize::{prefixes, tokenize};
use crate::error::{IndexError, Result};
use crate::types::ItemId;

/// Longest prefix registered for a single word, in characters.
pub const MAX_TOKEN_CHARS: usize = 32;

const CONFIG_KEY: &str = "cfg";
const REGISTRY_KEY: &str = "reg";
const MAP_KEY: &str = "map";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexConfig {
    max_token_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_token_chars: MAX_TOKEN_CHARS,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PrefixIndex {
    registry: Vec<ItemId>,
    registered: FnvHashSet<ItemId>,
    postings: FnvHashMap<Box<str>, ThinVec<ItemId>>,
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.registered.contains(&id)
    }

    /// Adds `text` under `id`. Returns `false` if the id was already registered.
    pub fn add(&mut self, id: ItemId, text: &str) -> bool {
        if !self.registered.insert(id) {
            return false;
        }
        self.registry.push(id);

        for word in tokenize(text) {
            for prefix in prefixes(&word, MAX_TOKEN_CHARS) {
                match self.postings.get_mut(prefix) {
                    Some(ids) => {
                        // Ids are added one at a time, so a repeat can only be
                        // the most recent entry.
                        if ids.last() != Some(&id) {
                            ids.push(id);
                        }
                    }
                    None => {
                        let mut ids = ThinVec::new();
                        ids.push(id);
                        self.postings.insert(prefix.into(), ids);
                    }
                }
            }
        }
        true
    }

    /// Returns up to `limit` ids whose text contains a word starting with
    /// every word of `query`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ItemId> {
        if limit == 0 {
            return Vec::new();
        }

        let mut words = tokenize(query);
        words.sort_unstable();
        words.dedup();
        if words.is_empty() {
            return Vec::new();
        }

        let mut lists = Vec::with_capacity(words.len());
        for word in &words {
            let token = truncate_chars(word, MAX_TOKEN_CHARS);
            match self.postings.get(token) {
                Some(ids) => lists.push(ids),
                None => return Vec::new(),
            }
        }

        // Drive from the rarest token; all posting lists share insertion
        // order so the driver's order is the index order.
        lists.sort_by_key(|ids| ids.len());
        let (driver, rest) = match lists.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };

        if rest.is_empty() {
            return driver.iter().take(limit).copied().collect();
        }

        let filters: Vec<FnvHashSet<ItemId>> = rest
            .iter()
            .map(|ids| ids.iter().copied().collect())
            .collect();

        driver
            .iter()
            .copied()
            .filter(|id| filters.iter().all(|set| set.contains(id)))
            .take(limit)
            .collect()
    }

    /// Flattens the index into string entries for a string-keyed store.
    pub fn export_entries(&self) -> Result<BTreeMap<String, String>> {
        let map: BTreeMap<&str, &ThinVec<ItemId>> = self
            .postings
            .iter()
            .map(|(token, ids)| (token.as_ref(), ids))
            .collect();

        let mut entries = BTreeMap::new();
        entries.insert(
            CONFIG_KEY.to_string(),
            serde_json::to_string(&IndexConfig::default())?,
        );
        entries.insert(
            REGISTRY_KEY.to_string(),
            serde_json::to_string(&self.registry)?,
        );
        entries.insert(MAP_KEY.to_string(), serde_json::to_string(&map)?);
        Ok(entries)
    }

    /// Rebuilds an index from entries produced by [`PrefixIndex::export_entries`].
    pub fn from_entries(entries: &BTreeMap<String, String>) -> Result<Self> {
        let config: IndexConfig = decode_entry(entries, CONFIG_KEY)?;
        if config != IndexConfig::default() {
            return Err(IndexError::MalformedSnapshot(format!(
                "index config mismatch: max_token_chars={}",
                config.max_token_chars
            )));
        }

        let registry: Vec<ItemId> = decode_entry(entries, REGISTRY_KEY)?;
        let mut registered = FnvHashSet::default();
        registered.reserve(registry.len());
        for id in &registry {
            if !registered.insert(*id) {
                return Err(IndexError::MalformedSnapshot(format!(
                    "duplicate id {id} in registry"
                )));
            }
        }

        let map: BTreeMap<String, ThinVec<ItemId>> = decode_entry(entries, MAP_KEY)?;
        let mut postings = FnvHashMap::default();
        postings.reserve(map.len());
        for (token, ids) in map {
            if token.is_empty() || ids.is_empty() {
                return Err(IndexError::MalformedSnapshot(format!(
                    "empty posting for token {token:?}"
                )));
            }
            if let Some(id) = ids.iter().find(|id| !registered.contains(*id)) {
                return Err(IndexError::MalformedSnapshot(format!(
                    "token {token:?} references unregistered id {id}"
                )));
            }
            postings.insert(token.into_boxed_str(), ids);
        }

        Ok(Self {
            registry,
            registered,
            postings,
        })
    }
}

fn decode_entry<T: serde::de::DeserializeOwned>(
    entries: &BTreeMap<String, String>,
    key: &str,
) -> Result<T> {
    let raw = entries
        .get(key)
        .ok_or_else(|| IndexError::MalformedSnapshot(format!("missing index entry {key:?}")))?;
    serde_json::from_str(raw).map_err(|error| {
        IndexError::MalformedSnapshot(format!("index entry {key:?} is unreadable: {error}"))
    })
}

fn truncate_chars(word: &str, max_chars: usize) -> &str {
    match word.char_indices().nth(max_chars) {
        Some((offset, _)) => &word[..offset],
        None => word,
    }
}
