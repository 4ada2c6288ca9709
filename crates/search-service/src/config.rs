use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_STORAGE_KEY: &str = "catalog_search_index";
const CACHE_DIR_NAME: &str = "item-search";

/// Tunables for the search service and its startup hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search requests still pending after this long are dropped.
    pub pending_timeout_ms: u64,
    /// Import/export requests resolve as failed after this long.
    pub snapshot_timeout_ms: u64,
    /// How often expired requests are swept when nothing is dispatched.
    pub sweep_interval_ms: u64,
    pub catalog_max_results: usize,
    pub market_max_results: usize,
    /// Capacity of the request and response channels to the index worker.
    pub request_capacity: usize,
    /// How long startup waits for a rebuilt catalog before giving up on export.
    pub ready_timeout_ms: u64,
    /// Slot in the persistent store holding the catalog snapshot.
    pub storage_key: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pending_timeout_ms: 5_000,
            snapshot_timeout_ms: 10_000,
            sweep_interval_ms: 1_000,
            catalog_max_results: 50,
            market_max_results: 25,
            request_capacity: 256,
            ready_timeout_ms: 120_000,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            cache_dir: None,
        }
    }
}

impl SearchConfig {
    /// Loads the config from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(error) => {
                return Err(ServiceError::InvalidInput(format!(
                    "failed to read config {}: {error}",
                    path.display()
                )))
            }
        };
        let config: Self = serde_json::from_str(&data).map_err(|error| {
            ServiceError::InvalidInput(format!("invalid config {}: {error}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.request_capacity == 0 {
            return Err(ServiceError::InvalidInput(
                "request_capacity must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ServiceError::InvalidInput(
                "sweep_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "storage_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// The configured cache directory, or the platform cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(CACHE_DIR_NAME)
        })
    }
}
