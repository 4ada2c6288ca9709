//! Search service for the item catalog and market collections.
//!
//! Owns the index worker, correlates its answers with callers, persists the
//! catalog snapshot between sessions, and exposes startup and query hooks.

pub mod config;
pub mod error;
pub mod hooks;
pub mod pending;
pub mod persistence;
pub mod service;
pub mod sources;
pub mod status;
pub mod storage;

pub use crate::config::SearchConfig;
pub use crate::error::{ServiceError, ServiceResult};
pub use crate::hooks::{CatalogInitOutcome, QueryTracker, SearchHooks};
pub use crate::service::SearchService;
pub use crate::sources::{
    CatalogSource, JsonFileCatalogSource, JsonFileMarketSource, MarketSource,
    StaticCatalogSource, StaticMarketSource,
};
pub use crate::status::{StatusPublisher, StatusSubscription};
pub use crate::storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
