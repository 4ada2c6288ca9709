//! Messages exchanged between the search service and the index worker.
//!
//! Every request that expects a correlated answer carries a `request_id`;
//! the matching response echoes it back. Init requests are fire-and-forget
//! and answered with a count-only report.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::market::{MarketItem, MarketRecord};
use crate::snapshot::IndexSnapshot;
use crate::types::{CatalogItem, IndexStatus};

pub type RequestId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum IndexRequest {
    InitCatalog {
        items: Vec<CatalogItem>,
    },
    InitMarket {
        items_by_id_string: HashMap<String, MarketRecord>,
    },
    ImportCatalogIndex {
        request_id: RequestId,
        snapshot: IndexSnapshot,
    },
    ExportCatalogIndex {
        request_id: RequestId,
        fingerprint: String,
    },
    SearchCatalog {
        request_id: RequestId,
        query: String,
        #[serde(default)]
        max_results: Option<usize>,
    },
    SearchMarket {
        request_id: RequestId,
        query: String,
        #[serde(default)]
        max_results: Option<usize>,
    },
    GetStatus,
}

impl IndexRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitCatalog { .. } => "InitCatalog",
            Self::InitMarket { .. } => "InitMarket",
            Self::ImportCatalogIndex { .. } => "ImportCatalogIndex",
            Self::ExportCatalogIndex { .. } => "ExportCatalogIndex",
            Self::SearchCatalog { .. } => "SearchCatalog",
            Self::SearchMarket { .. } => "SearchMarket",
            Self::GetStatus => "GetStatus",
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::ImportCatalogIndex { request_id, .. }
            | Self::ExportCatalogIndex { request_id, .. }
            | Self::SearchCatalog { request_id, .. }
            | Self::SearchMarket { request_id, .. } => Some(*request_id),
            Self::InitCatalog { .. } | Self::InitMarket { .. } | Self::GetStatus => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum IndexResponse {
    CatalogIndexed {
        count: usize,
    },
    MarketIndexed {
        count: usize,
    },
    CatalogResults {
        request_id: RequestId,
        query: String,
        results: Vec<CatalogItem>,
    },
    MarketResults {
        request_id: RequestId,
        query: String,
        results: Vec<MarketItem>,
    },
    Status(IndexStatus),
    CatalogIndexExported {
        request_id: RequestId,
        snapshot: IndexSnapshot,
    },
    CatalogIndexImported {
        request_id: RequestId,
        count: usize,
    },
    Error {
        #[serde(default)]
        request_id: Option<RequestId>,
        message: String,
    },
}

impl IndexResponse {
    pub fn error(request_id: Option<RequestId>, error: &impl fmt::Display) -> Self {
        Self::Error {
            request_id,
            message: error.to_string(),
        }
    }
}
