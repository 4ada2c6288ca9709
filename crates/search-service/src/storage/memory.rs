use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::ServiceResult;
use crate::storage::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, name: &str) -> ServiceResult<Option<String>> {
        Ok(self.data.read().get(name).cloned())
    }

    async fn set_item(&self, name: &str, value: &str) -> ServiceResult<()> {
        self.data.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, name: &str) -> ServiceResult<bool> {
        Ok(self.data.write().remove(name).is_some())
    }
}
