//! Glue between the search service and whatever drives it.
//!
//! [`SearchHooks`] runs the startup sequence (restore the catalog from the
//! cached snapshot or rebuild and cache it) and wraps searches with a
//! latest-query check so answers for a query the user has already moved
//! past are discarded.

use std::sync::Arc;

use parking_lot::Mutex;
use search_index::{fingerprint, CatalogItem, IndexStatus, MarketItem};
use tokio::sync::OnceCell;

use crate::error::ServiceResult;
use crate::persistence::{load_snapshot, save_snapshot};
use crate::service::SearchService;
use crate::sources::{CatalogSource, MarketSource};
use crate::status::StatusSubscription;
use crate::storage::SharedStore;

/// How the catalog index came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogInitOutcome {
    /// Imported from a cached snapshot with a matching fingerprint.
    Restored { count: usize },
    /// Built from source; `saved` reports whether the snapshot was cached.
    Rebuilt { count: usize, saved: bool },
    /// The source returned no items; nothing was indexed.
    Empty,
    Failed(String),
}

/// Most recent query typed into one search box.
#[derive(Debug, Default)]
pub struct QueryTracker {
    latest: Mutex<String>,
}

impl QueryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, query: &str) {
        let mut latest = self.latest.lock();
        latest.clear();
        latest.push_str(query);
    }

    /// Whether results computed for `query` should still be applied.
    pub fn is_current(&self, query: &str) -> bool {
        *self.latest.lock() == query
    }

    pub fn latest(&self) -> String {
        self.latest.lock().clone()
    }
}

pub struct SearchHooks {
    service: SearchService,
    store: SharedStore,
    catalog_source: Arc<dyn CatalogSource>,
    market_source: Arc<dyn MarketSource>,
    catalog_init: OnceCell<CatalogInitOutcome>,
    catalog_queries: QueryTracker,
    market_queries: QueryTracker,
}

impl SearchHooks {
    pub fn new(
        service: SearchService,
        store: SharedStore,
        catalog_source: Arc<dyn CatalogSource>,
        market_source: Arc<dyn MarketSource>,
    ) -> Self {
        Self {
            service,
            store,
            catalog_source,
            market_source,
            catalog_init: OnceCell::new(),
            catalog_queries: QueryTracker::new(),
            market_queries: QueryTracker::new(),
        }
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }

    /// Builds or restores the catalog index. Only the first call does any
    /// work; later calls return the first outcome.
    pub async fn init_catalog_search_index(&self) -> CatalogInitOutcome {
        self.catalog_init
            .get_or_init(|| self.prepare_catalog())
            .await
            .clone()
    }

    async fn prepare_catalog(&self) -> CatalogInitOutcome {
        let items = match self.catalog_source.fetch_catalog().await {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!("catalog fetch failed: {error}");
                return CatalogInitOutcome::Failed(error.to_string());
            }
        };
        if items.is_empty() {
            tracing::warn!("catalog source returned no items; search index not built");
            return CatalogInitOutcome::Empty;
        }

        let expected = fingerprint(&items);
        let key = self.service.config().storage_key.clone();

        if let Some(snapshot) = load_snapshot(self.store.as_ref(), &key).await {
            if snapshot.fingerprint != expected {
                tracing::info!(
                    "cached search index is stale (cached={}, current={expected}); rebuilding",
                    snapshot.fingerprint
                );
            } else if self.service.import_catalog_index(snapshot).await {
                let count = self.service.status().catalog_count;
                tracing::info!("restored catalog search index from cache ({count} items)");
                return CatalogInitOutcome::Restored { count };
            } else {
                tracing::warn!("cached search index was rejected; rebuilding");
            }
        }

        match self.rebuild_catalog(items, expected, &key).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!("catalog search index build failed: {error}");
                CatalogInitOutcome::Failed(error.to_string())
            }
        }
    }

    async fn rebuild_catalog(
        &self,
        items: Vec<CatalogItem>,
        fingerprint: String,
        key: &str,
    ) -> ServiceResult<CatalogInitOutcome> {
        self.service.init_catalog(items).await?;
        self.service
            .wait_for_catalog_ready(self.service.config().ready_timeout())
            .await?;

        // The export is queued behind the build, so it reflects the new
        // catalog even if an earlier build already marked the catalog ready.
        let Some(snapshot) = self.service.export_catalog_index(fingerprint).await else {
            tracing::warn!("catalog search index export failed; not cached");
            return Ok(CatalogInitOutcome::Rebuilt {
                count: self.service.status().catalog_count,
                saved: false,
            });
        };
        let count = snapshot.items.len();

        let saved = match save_snapshot(self.store.as_ref(), key, &snapshot).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("failed to cache catalog search index: {error}");
                false
            }
        };
        Ok(CatalogInitOutcome::Rebuilt { count, saved })
    }

    pub async fn init_market_search_index(&self) -> ServiceResult<()> {
        let records = self.market_source.fetch_market().await?;
        if records.is_empty() {
            tracing::warn!("market source returned no records");
        }
        self.service.init_market(records).await
    }

    /// Searches the catalog for `query`. Returns `None` when a newer query
    /// was recorded before the results arrived.
    pub async fn search_catalog(&self, query: &str) -> Option<Vec<CatalogItem>> {
        self.catalog_queries.record(query);
        if query.trim().is_empty() {
            return Some(Vec::new());
        }

        let results = self
            .service
            .search_catalog(query, None)
            .await
            .unwrap_or_else(|error| {
                tracing::debug!("catalog search {query:?} failed: {error}");
                Vec::new()
            });
        self.catalog_queries.is_current(query).then_some(results)
    }

    /// Searches market items for `query`. Returns `None` when superseded.
    pub async fn search_limiteds(&self, query: &str) -> Option<Vec<MarketItem>> {
        self.market_queries.record(query);
        if query.trim().is_empty() {
            return Some(Vec::new());
        }

        let results = self
            .service
            .search_market(query, None)
            .await
            .unwrap_or_else(|error| {
                tracing::debug!("market search {query:?} failed: {error}");
                Vec::new()
            });
        self.market_queries.is_current(query).then_some(results)
    }

    pub fn on_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(&IndexStatus) + Send + Sync + 'static,
    {
        self.service.on_status_change(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use search_index::{decode_snapshot, MarketRecord};

    use crate::config::SearchConfig;
    use crate::sources::{StaticCatalogSource, StaticMarketSource};
    use crate::storage::{KeyValueStore, MemoryStore};

    struct CountingCatalog {
        items: Vec<CatalogItem>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl CatalogSource for CountingCatalog {
        async fn fetch_catalog(&self) -> ServiceResult<Vec<CatalogItem>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::named(1, "Top Hat"),
            CatalogItem::named(2, "Tophat Deluxe"),
            CatalogItem::named(3, "Red Top"),
        ]
    }

    fn market() -> HashMap<String, MarketRecord> {
        HashMap::from([(
            "10".to_string(),
            MarketRecord(
                "Dominus Empyreus".to_string(),
                "DE".to_string(),
                1_000,
                2_000,
                -1,
                4,
                3,
                -1,
                -1,
                -1,
            ),
        )])
    }

    fn hooks_with(store: Arc<MemoryStore>, items: Vec<CatalogItem>) -> SearchHooks {
        SearchHooks::new(
            SearchService::spawn(SearchConfig::default()),
            store,
            Arc::new(StaticCatalogSource::new(items)),
            Arc::new(StaticMarketSource::new(market())),
        )
    }

    async fn cached_snapshot(store: &MemoryStore) -> search_index::IndexSnapshot {
        let raw = store
            .get_item(&SearchConfig::default().storage_key)
            .await
            .expect("read")
            .expect("cached");
        decode_snapshot(&raw).expect("decode")
    }

    #[tokio::test]
    async fn first_start_builds_and_caches() {
        let store = Arc::new(MemoryStore::new());
        let hooks = hooks_with(store.clone(), catalog());

        let outcome = hooks.init_catalog_search_index().await;
        assert_eq!(
            outcome,
            CatalogInitOutcome::Rebuilt {
                count: 3,
                saved: true
            }
        );
        assert_eq!(cached_snapshot(&store).await.fingerprint, "v1_3_1_3");

        let results = hooks.search_catalog("top").await.expect("current");
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn second_start_restores_from_cache() {
        let store = Arc::new(MemoryStore::new());
        hooks_with(store.clone(), catalog())
            .init_catalog_search_index()
            .await;

        let hooks = hooks_with(store.clone(), catalog());
        assert_eq!(
            hooks.init_catalog_search_index().await,
            CatalogInitOutcome::Restored { count: 3 }
        );
        let results = hooks.search_catalog("top h").await.expect("current");
        assert_eq!(results.iter().map(|item| item.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn changed_catalog_rebuilds_stale_cache() {
        let store = Arc::new(MemoryStore::new());
        hooks_with(store.clone(), catalog())
            .init_catalog_search_index()
            .await;

        let mut grown = catalog();
        grown.push(CatalogItem::named(4, "Sparkle Time Fedora"));
        let hooks = hooks_with(store.clone(), grown);

        assert_eq!(
            hooks.init_catalog_search_index().await,
            CatalogInitOutcome::Rebuilt {
                count: 4,
                saved: true
            }
        );
        assert_eq!(cached_snapshot(&store).await.fingerprint, "v1_4_1_4");
        let results = hooks.search_catalog("fedora").await.expect("current");
        assert_eq!(results[0].id, 4);
    }

    #[tokio::test]
    async fn rebuild_reports_new_count_on_already_ready_service() {
        let service = SearchService::spawn(SearchConfig::default());
        service.init_catalog(catalog()).await.expect("first build");
        service
            .wait_for_catalog_ready(std::time::Duration::from_secs(5))
            .await
            .expect("ready");

        let mut grown = catalog();
        grown.push(CatalogItem::named(4, "Sparkle Time Fedora"));
        let store = Arc::new(MemoryStore::new());
        let hooks = SearchHooks::new(
            service,
            store.clone(),
            Arc::new(StaticCatalogSource::new(grown)),
            Arc::new(StaticMarketSource::default()),
        );

        assert_eq!(
            hooks.init_catalog_search_index().await,
            CatalogInitOutcome::Rebuilt {
                count: 4,
                saved: true
            }
        );
        assert_eq!(cached_snapshot(&store).await.items.len(), 4);
    }

    #[tokio::test]
    async fn corrupt_cache_falls_back_to_rebuild() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item(&SearchConfig::default().storage_key, "{not a snapshot")
            .await
            .expect("write");
        let hooks = hooks_with(store.clone(), catalog());

        assert!(matches!(
            hooks.init_catalog_search_index().await,
            CatalogInitOutcome::Rebuilt { saved: true, .. }
        ));
        assert_eq!(cached_snapshot(&store).await.items.len(), 3);
    }

    #[tokio::test]
    async fn empty_catalog_is_not_indexed() {
        let store = Arc::new(MemoryStore::new());
        let hooks = hooks_with(store.clone(), Vec::new());

        assert_eq!(
            hooks.init_catalog_search_index().await,
            CatalogInitOutcome::Empty
        );
        assert!(store.is_empty());
        assert!(!hooks.service().status().catalog_ready);
    }

    #[tokio::test]
    async fn init_runs_once() {
        let source = Arc::new(CountingCatalog {
            items: catalog(),
            fetches: AtomicUsize::new(0),
        });
        let hooks = SearchHooks::new(
            SearchService::spawn(SearchConfig::default()),
            Arc::new(MemoryStore::new()),
            source.clone(),
            Arc::new(StaticMarketSource::default()),
        );

        let (first, second) = tokio::join!(
            hooks.init_catalog_search_index(),
            hooks.init_catalog_search_index()
        );
        assert_eq!(first, second);
        assert_eq!(hooks.init_catalog_search_index().await, first);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn market_hook_indexes_records() {
        let hooks = hooks_with(Arc::new(MemoryStore::new()), catalog());
        hooks.init_market_search_index().await.expect("market init");
        hooks
            .service()
            .wait_for_market_ready(std::time::Duration::from_secs(5))
            .await
            .expect("ready");

        let results = hooks.search_limiteds("de").await.expect("current");
        assert_eq!(results[0].demand_label, "Amazing");
        assert_eq!(results[0].trend_label, "Raising");
    }

    #[tokio::test]
    async fn blank_query_short_circuits() {
        let hooks = hooks_with(Arc::new(MemoryStore::new()), catalog());
        assert_eq!(hooks.search_catalog("   ").await, Some(Vec::new()));
        assert_eq!(hooks.search_limiteds("").await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn superseded_query_is_discarded() {
        let hooks = hooks_with(Arc::new(MemoryStore::new()), catalog());
        hooks.init_catalog_search_index().await;

        // Both queries are recorded before either answer can arrive.
        let (stale, fresh) = tokio::join!(hooks.search_catalog("top"), hooks.search_catalog("red"));

        assert_eq!(stale, None);
        let fresh = fresh.expect("latest query applies");
        assert_eq!(fresh[0].id, 3);
    }

    #[test]
    fn tracker_compares_latest_query() {
        let tracker = QueryTracker::new();
        tracker.record("dom");
        assert!(tracker.is_current("dom"));
        tracker.record("domi");
        assert!(!tracker.is_current("dom"));
        assert_eq!(tracker.latest(), "domi");
    }
}
