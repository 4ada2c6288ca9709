//! The index engine: both collections, their indexes and their items.
//!
//! The engine is a plain owned struct. It is driven by the worker thread,
//! one request at a time, and never shared.

use std::collections::HashMap;
use std::time::Instant;

use fnv::FnvHashMap;

use crate::error::{IndexError, Result};
use crate::index::PrefixIndex;
use crate::market::{parse_market_records, MarketItem, MarketRecord};
use crate::protocol::{IndexRequest, IndexResponse};
use crate::snapshot::{IndexSnapshot, SNAPSHOT_FORMAT_VERSION};
use crate::types::{CatalogItem, IndexStatus, ItemId};

/// Result cap used when a search request does not carry one.
pub const DEFAULT_MAX_RESULTS: usize = 50;

#[derive(Debug, Default)]
struct CatalogIndex {
    names: PrefixIndex,
    items: FnvHashMap<ItemId, CatalogItem>,
}

#[derive(Debug, Default)]
struct MarketIndex {
    names: PrefixIndex,
    acronyms: PrefixIndex,
    items: FnvHashMap<ItemId, MarketItem>,
}

#[derive(Debug, Default)]
pub struct IndexEngine {
    catalog: Option<CatalogIndex>,
    market: Option<MarketIndex>,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            catalog_ready: self.catalog.is_some(),
            market_ready: self.market.is_some(),
            catalog_count: self.catalog.as_ref().map_or(0, |c| c.items.len()),
            market_count: self.market.as_ref().map_or(0, |m| m.items.len()),
        }
    }

    /// Replaces the catalog index with one built from `items`.
    ///
    /// When an id appears more than once the first row wins.
    pub fn init_catalog(&mut self, items: Vec<CatalogItem>) -> usize {
        let started = Instant::now();
        let mut catalog = CatalogIndex::default();
        catalog.items.reserve(items.len());
        let mut duplicates = 0usize;

        for item in items {
            if !catalog.names.add(item.id, &item.name) {
                duplicates += 1;
                continue;
            }
            catalog.items.insert(item.id, item);
        }

        let count = catalog.items.len();
        self.catalog = Some(catalog);
        log::info!(
            "catalog index built count={} duplicates={} elapsed_ms={}",
            count,
            duplicates,
            started.elapsed().as_millis()
        );
        count
    }

    /// Replaces the market index with one built from positional records.
    pub fn init_market(&mut self, records: &HashMap<String, MarketRecord>) -> usize {
        let started = Instant::now();
        let mut market = MarketIndex::default();
        let items = parse_market_records(records);
        market.items.reserve(items.len());

        for item in items {
            market.names.add(item.id, &item.name);
            if !item.acronym.is_empty() {
                market.acronyms.add(item.id, &item.acronym);
            }
            market.items.insert(item.id, item);
        }

        let count = market.items.len();
        self.market = Some(market);
        log::info!(
            "market index built count={} skipped={} elapsed_ms={}",
            count,
            records.len().saturating_sub(count),
            started.elapsed().as_millis()
        );
        count
    }

    /// Restores the catalog from a snapshot.
    ///
    /// Everything is rebuilt aside and swapped in only once fully valid, so
    /// a rejected snapshot leaves the current catalog untouched.
    pub fn import_catalog(&mut self, snapshot: IndexSnapshot) -> Result<usize> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(IndexError::VersionMismatch {
                found: snapshot.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let names = PrefixIndex::from_entries(&snapshot.serialized_index)?;

        let mut items = FnvHashMap::default();
        items.reserve(snapshot.items.len());
        for (id, item) in snapshot.items {
            if id != item.id {
                return Err(IndexError::MalformedSnapshot(format!(
                    "item keyed {id} carries id {}",
                    item.id
                )));
            }
            if !names.contains(id) {
                return Err(IndexError::MalformedSnapshot(format!(
                    "item {id} is not in the index"
                )));
            }
            if items.insert(id, item).is_some() {
                return Err(IndexError::MalformedSnapshot(format!(
                    "item {id} appears twice"
                )));
            }
        }
        if items.len() != names.len() {
            return Err(IndexError::MalformedSnapshot(format!(
                "index lists {} ids but snapshot carries {} items",
                names.len(),
                items.len()
            )));
        }

        let count = items.len();
        self.catalog = Some(CatalogIndex { names, items });
        log::info!(
            "catalog index imported count={} fingerprint={}",
            count,
            snapshot.fingerprint
        );
        Ok(count)
    }

    /// Captures the live catalog index. Fails if the catalog was never built.
    pub fn export_catalog(&self, fingerprint: String) -> Result<IndexSnapshot> {
        let catalog = self.catalog.as_ref().ok_or(IndexError::NotReady("catalog"))?;

        let mut items: Vec<(ItemId, CatalogItem)> = catalog
            .items
            .iter()
            .map(|(id, item)| (*id, item.clone()))
            .collect();
        items.sort_unstable_by_key(|(id, _)| *id);

        Ok(IndexSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            fingerprint,
            serialized_index: catalog.names.export_entries()?,
            items,
        })
    }

    /// Searches catalog names. Empty when the catalog is not ready.
    pub fn search_catalog(&self, query: &str, max_results: usize) -> Vec<CatalogItem> {
        let Some(catalog) = self.catalog.as_ref() else {
            return Vec::new();
        };

        catalog
            .names
            .search(query, max_results)
            .into_iter()
            .filter_map(|id| catalog.items.get(&id).cloned())
            .collect()
    }

    /// Searches market names, then fills remaining slots from acronyms.
    pub fn search_market(&self, query: &str, max_results: usize) -> Vec<MarketItem> {
        let Some(market) = self.market.as_ref() else {
            return Vec::new();
        };

        let mut ids = market.names.search(query, max_results);
        if ids.len() < max_results {
            // Over-fetch so that acronym hits already matched by name do not
            // eat into the remaining slots.
            for id in market.acronyms.search(query, max_results.saturating_add(ids.len())) {
                if ids.len() >= max_results {
                    break;
                }
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        ids.into_iter()
            .filter_map(|id| market.items.get(&id).cloned())
            .collect()
    }

    /// Handles one protocol request.
    pub fn handle(&mut self, request: IndexRequest) -> IndexResponse {
        match request {
            IndexRequest::InitCatalog { items } => IndexResponse::CatalogIndexed {
                count: self.init_catalog(items),
            },
            IndexRequest::InitMarket { items_by_id_string } => IndexResponse::MarketIndexed {
                count: self.init_market(&items_by_id_string),
            },
            IndexRequest::ImportCatalogIndex {
                request_id,
                snapshot,
            } => match self.import_catalog(snapshot) {
                Ok(count) => IndexResponse::CatalogIndexImported { request_id, count },
                Err(error) => {
                    log::warn!("catalog index import rejected: {error}");
                    IndexResponse::error(Some(request_id), &error)
                }
            },
            IndexRequest::ExportCatalogIndex {
                request_id,
                fingerprint,
            } => match self.export_catalog(fingerprint) {
                Ok(snapshot) => IndexResponse::CatalogIndexExported {
                    request_id,
                    snapshot,
                },
                Err(error) => IndexResponse::error(Some(request_id), &error),
            },
            IndexRequest::SearchCatalog {
                request_id,
                query,
                max_results,
            } => {
                let results =
                    self.search_catalog(&query, max_results.unwrap_or(DEFAULT_MAX_RESULTS));
                IndexResponse::CatalogResults {
                    request_id,
                    query,
                    results,
                }
            }
            IndexRequest::SearchMarket {
                request_id,
                query,
                max_results,
            } => {
                let results =
                    self.search_market(&query, max_results.unwrap_or(DEFAULT_MAX_RESULTS));
                IndexResponse::MarketResults {
                    request_id,
                    query,
                    results,
                }
            }
            IndexRequest::GetStatus => IndexResponse::Status(self.status()),
        }
    }
}
