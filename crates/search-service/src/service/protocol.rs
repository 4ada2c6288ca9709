use std::collections::HashMap;

use search_index::{CatalogItem, IndexSnapshot, MarketItem, MarketRecord};
use tokio::sync::oneshot;

use crate::error::ServiceResult;

pub(crate) enum ServiceEvent {
    InitCatalog {
        items: Vec<CatalogItem>,
        reply: oneshot::Sender<ServiceResult<()>>,
    },
    InitMarket {
        records: HashMap<String, MarketRecord>,
        reply: oneshot::Sender<ServiceResult<()>>,
    },
    ImportCatalogIndex {
        snapshot: IndexSnapshot,
        reply: oneshot::Sender<bool>,
    },
    ExportCatalogIndex {
        fingerprint: String,
        reply: oneshot::Sender<Option<IndexSnapshot>>,
    },
    SearchCatalog {
        query: String,
        max_results: Option<usize>,
        reply: oneshot::Sender<Vec<CatalogItem>>,
    },
    SearchMarket {
        query: String,
        max_results: Option<usize>,
        reply: oneshot::Sender<Vec<MarketItem>>,
    },
    RefreshStatus {
        reply: oneshot::Sender<ServiceResult<()>>,
    },
    Terminate {
        reply: oneshot::Sender<()>,
    },
}
