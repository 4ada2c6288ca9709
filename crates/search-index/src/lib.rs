//! Prefix search indexes for the catalog and market collections.
//!
//! This crate provides:
//! - A forward prefix index with flat, string-keyed export
//! - The index engine owning both collections
//! - Snapshot encoding and collection fingerprints
//! - The request/response protocol and the worker thread that serves it

pub mod engine;
pub mod error;
pub mod index;
pub mod market;
pub mod protocol;
pub mod snapshot;
pub mod types;
pub mod worker;

// Re-export main types
pub use engine::{IndexEngine, DEFAULT_MAX_RESULTS};
pub use error::{IndexError, Result};
pub use index::PrefixIndex;
pub use market::{MarketItem, MarketRecord};
pub use protocol::{IndexRequest, IndexResponse, RequestId};
pub use snapshot::{
    decode_snapshot, encode_snapshot, fingerprint, IndexSnapshot, SNAPSHOT_FORMAT_VERSION,
};
pub use types::{CatalogItem, IndexStatus, ItemId};
pub use worker::{spawn_index_worker, IndexWorker, WorkerEnvelope};
