//! Where collections come from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use search_index::{CatalogItem, MarketRecord};

use crate::error::{ServiceError, ServiceResult};

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> ServiceResult<Vec<CatalogItem>>;
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_market(&self) -> ServiceResult<HashMap<String, MarketRecord>>;
}

/// Catalog read from a JSON array of items.
#[derive(Debug, Clone)]
pub struct JsonFileCatalogSource {
    path: PathBuf,
}

impl JsonFileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalogSource {
    async fn fetch_catalog(&self) -> ServiceResult<Vec<CatalogItem>> {
        read_json(&self.path).await
    }
}

/// Market read from a JSON object of positional records keyed by id.
#[derive(Debug, Clone)]
pub struct JsonFileMarketSource {
    path: PathBuf,
}

impl JsonFileMarketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarketSource for JsonFileMarketSource {
    async fn fetch_market(&self) -> ServiceResult<HashMap<String, MarketRecord>> {
        read_json(&self.path).await
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    items: Vec<CatalogItem>,
}

impl StaticCatalogSource {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_catalog(&self) -> ServiceResult<Vec<CatalogItem>> {
        Ok(self.items.clone())
    }
}

/// Fixed in-memory market.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketSource {
    records: HashMap<String, MarketRecord>,
}

impl StaticMarketSource {
    pub fn new(records: HashMap<String, MarketRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl MarketSource for StaticMarketSource {
    async fn fetch_market(&self) -> ServiceResult<HashMap<String, MarketRecord>> {
        Ok(self.records.clone())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ServiceResult<T> {
    let data = tokio::fs::read_to_string(path).await.map_err(|error| {
        ServiceError::Source(format!("failed to read {}: {error}", path.display()))
    })?;
    serde_json::from_str(&data)
        .map_err(|error| ServiceError::Source(format!("invalid {}: {error}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_catalog_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Top Hat", "price": 25, "isForSale": true}, {"id": 2, "name": "Red Top"}]"#,
        )
        .expect("write");

        let items = JsonFileCatalogSource::new(&path)
            .fetch_catalog()
            .await
            .expect("catalog");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].price, Some(25));
        assert!(items[0].is_for_sale);
        assert_eq!(items[1].name, "Red Top");
    }

    #[tokio::test]
    async fn reads_market_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("market.json");
        std::fs::write(
            &path,
            r#"{"10": ["Dominus Empyreus", "DE", 1000, 2000, -1, 4, 3, -1, 1, -1]}"#,
        )
        .expect("write");

        let records = JsonFileMarketSource::new(&path)
            .fetch_market()
            .await
            .expect("market");
        assert_eq!(records["10"].1, "DE");
        assert_eq!(records["10"].5, 4);
    }

    #[tokio::test]
    async fn missing_or_invalid_file_is_source_error() {
        let dir = tempdir().expect("tempdir");
        let missing = JsonFileCatalogSource::new(dir.path().join("missing.json"));
        assert!(matches!(
            missing.fetch_catalog().await,
            Err(ServiceError::Source(_))
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").expect("write");
        assert!(matches!(
            JsonFileMarketSource::new(&path).fetch_market().await,
            Err(ServiceError::Source(_))
        ));
    }
}
