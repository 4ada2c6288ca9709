pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ServiceResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// String-keyed persistent store with `getItem`/`setItem` semantics.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, name: &str) -> ServiceResult<Option<String>>;
    async fn set_item(&self, name: &str, value: &str) -> ServiceResult<()>;
    async fn remove_item(&self, name: &str) -> ServiceResult<bool>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;
