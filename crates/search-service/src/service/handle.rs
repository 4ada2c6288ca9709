use std::collections::HashMap;
use std::time::Duration;

use search_index::{CatalogItem, IndexSnapshot, IndexStatus, MarketItem, MarketRecord};
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SearchConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::service::actor::SearchServiceActor;
use crate::service::protocol::ServiceEvent;
use crate::status::{StatusPublisher, StatusSubscription};

/// Cloneable handle to the search service actor.
///
/// The actor stops once every handle has been dropped. Must be created
/// inside a tokio runtime.
#[derive(Clone)]
pub struct SearchService {
    config: SearchConfig,
    event_tx: mpsc::UnboundedSender<ServiceEvent>,
    status: StatusPublisher,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("status", &self.status.current())
            .field("closed", &self.event_tx.is_closed())
            .finish()
    }
}

impl SearchService {
    pub fn spawn(config: SearchConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let status = StatusPublisher::new();
        let actor = SearchServiceActor::new(config.clone(), event_rx, status.clone());

        tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            config,
            event_tx,
            status,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    /// Queues a full catalog build. Completion is observed through status.
    pub async fn init_catalog(&self, items: Vec<CatalogItem>) -> ServiceResult<()> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::InitCatalog { items, reply })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("catalog init"))?
    }

    /// Queues a market build from raw records keyed by id string.
    pub async fn init_market(&self, records: HashMap<String, MarketRecord>) -> ServiceResult<()> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::InitMarket { records, reply })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("market init"))?
    }

    /// Restores the catalog from `snapshot`. Resolves `false` on any failure,
    /// timeout, or when a newer import displaces this one.
    pub async fn import_catalog_index(&self, snapshot: IndexSnapshot) -> bool {
        let (reply, receiver) = oneshot::channel();
        if let Err(error) = self.send(ServiceEvent::ImportCatalogIndex { snapshot, reply }) {
            tracing::warn!("catalog index import not sent: {error}");
            return false;
        }
        receiver.await.unwrap_or(false)
    }

    /// Captures the catalog index. Resolves `None` on any failure, timeout,
    /// or when a newer export displaces this one.
    pub async fn export_catalog_index(&self, fingerprint: String) -> Option<IndexSnapshot> {
        let (reply, receiver) = oneshot::channel();
        if let Err(error) = self.send(ServiceEvent::ExportCatalogIndex { fingerprint, reply }) {
            tracing::warn!("catalog index export not sent: {error}");
            return None;
        }
        receiver.await.unwrap_or(None)
    }

    /// Searches the catalog. A request evicted before the worker answered
    /// yields [`ServiceError::Dropped`].
    pub async fn search_catalog(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> ServiceResult<Vec<CatalogItem>> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::SearchCatalog {
            query: query.to_string(),
            max_results,
            reply,
        })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("catalog search"))
    }

    pub async fn search_market(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> ServiceResult<Vec<MarketItem>> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::SearchMarket {
            query: query.to_string(),
            max_results,
            reply,
        })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("market search"))
    }

    /// Asks the worker for its status. The answer arrives through the
    /// status publisher.
    pub async fn refresh_status(&self) -> ServiceResult<()> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::RefreshStatus { reply })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("status refresh"))?
    }

    /// Last status published by the service.
    pub fn status(&self) -> IndexStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<IndexStatus> {
        self.status.subscribe()
    }

    pub fn on_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(&IndexStatus) + Send + Sync + 'static,
    {
        self.status.on_change(callback)
    }

    pub async fn wait_for_catalog_ready(&self, timeout: Duration) -> ServiceResult<IndexStatus> {
        self.status
            .wait_for(|status| status.catalog_ready, timeout)
            .await
    }

    pub async fn wait_for_market_ready(&self, timeout: Duration) -> ServiceResult<IndexStatus> {
        self.status
            .wait_for(|status| status.market_ready, timeout)
            .await
    }

    /// Stops the worker and fails everything pending. The next request
    /// starts a new worker.
    pub async fn terminate(&self) -> ServiceResult<()> {
        let (reply, receiver) = oneshot::channel();
        self.send(ServiceEvent::Terminate { reply })?;
        receiver
            .await
            .map_err(|_| ServiceError::Dropped("terminate"))
    }

    fn send(&self, event: ServiceEvent) -> ServiceResult<()> {
        self.event_tx
            .send(event)
            .map_err(|_| ServiceError::Internal("search service stopped".to_string()))
    }
}
