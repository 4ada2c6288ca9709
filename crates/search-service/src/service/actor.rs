
use search_index::{
    spawn_index_worker, IndexRequest, IndexResponse, IndexStatus, IndexWorker, RequestId,
    WorkerEnvelope,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SearchConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::pending::{PendingRequests, PendingSearch, PendingSlot};
use crate::service::protocol::ServiceEvent;
use crate::status::StatusPublisher;

struct ActiveWorker {
    requests: mpsc::Sender<IndexRequest>,
    handle: IndexWorker,
}

pub(crate) struct SearchServiceActor {
    config: SearchConfig,
    event_rx: mpsc::UnboundedReceiver<ServiceEvent>,
    response_tx: mpsc::Sender<WorkerEnvelope>,
    response_rx: mpsc::Receiver<WorkerEnvelope>,
    worker: Option<ActiveWorker>,
    generation: u64,
    next_request_id: RequestId,
    pending: PendingRequests,
    status: IndexStatus,
    publisher: StatusPublisher,
}

impl SearchServiceActor {
    pub(crate) fn new(
        config: SearchConfig,
        event_rx: mpsc::UnboundedReceiver<ServiceEvent>,
        publisher: StatusPublisher,
    ) -> Self {
        let (response_tx, response_rx) = mpsc::channel(config.request_capacity.max(1));
        Self {
            config,
            event_rx,
            response_tx,
            response_rx,
            worker: None,
            generation: 0,
            next_request_id: 0,
            pending: PendingRequests::default(),
            status: IndexStatus::default(),
            publisher,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(envelope) = self.response_rx.recv() => self.handle_envelope(envelope),
                _ = sweep.tick() => {
                    self.sweep(Instant::now());
                }
            }
        }

        let dropped = self.pending.clear();
        if let Some(worker) = self.worker.take() {
            tracing::debug!(
                "search service stopped; releasing index worker {} ({} pending dropped)",
                worker.handle.generation(),
                dropped
            );
        }
    }

    fn handle_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::InitCatalog { items, reply } => {
                let count = items.len();
                let result = self.send_to_worker(IndexRequest::InitCatalog { items });
                if result.is_ok() {
                    tracing::debug!("dispatched catalog build for {count} items");
                }
                let _ = reply.send(result);
            }
            ServiceEvent::InitMarket { records, reply } => {
                let result = self.send_to_worker(IndexRequest::InitMarket {
                    items_by_id_string: records,
                });
                let _ = reply.send(result);
            }
            ServiceEvent::ImportCatalogIndex { snapshot, reply } => {
                let now = self.sweep(Instant::now());
                let request_id = self.next_request_id();
                self.pending.import.install(PendingSlot::new(
                    request_id,
                    now + self.config.snapshot_timeout(),
                    reply,
                ));
                let request = IndexRequest::ImportCatalogIndex {
                    request_id,
                    snapshot,
                };
                if let Err(error) = self.send_to_worker(request) {
                    tracing::warn!("catalog index import {request_id} not dispatched: {error}");
                    self.pending.import.fail(request_id);
                }
            }
            ServiceEvent::ExportCatalogIndex { fingerprint, reply } => {
                let now = self.sweep(Instant::now());
                let request_id = self.next_request_id();
                self.pending.export.install(PendingSlot::new(
                    request_id,
                    now + self.config.snapshot_timeout(),
                    reply,
                ));
                let request = IndexRequest::ExportCatalogIndex {
                    request_id,
                    fingerprint,
                };
                if let Err(error) = self.send_to_worker(request) {
                    tracing::warn!("catalog index export {request_id} not dispatched: {error}");
                    self.pending.export.fail(request_id);
                }
            }
            ServiceEvent::SearchCatalog {
                query,
                max_results,
                reply,
            } => {
                let now = self.sweep(Instant::now());
                let request_id = self.next_request_id();
                self.pending.catalog.register(PendingSearch::new(
                    request_id,
                    query.clone(),
                    now + self.config.pending_timeout(),
                    reply,
                ));
                let request = IndexRequest::SearchCatalog {
                    request_id,
                    query,
                    max_results: Some(max_results.unwrap_or(self.config.catalog_max_results)),
                };
                if let Err(error) = self.send_to_worker(request) {
                    tracing::warn!("catalog search {request_id} not dispatched: {error}");
                    self.pending.catalog.remove(request_id);
                }
            }
            ServiceEvent::SearchMarket {
                query,
                max_results,
                reply,
            } => {
                let now = self.sweep(Instant::now());
                let request_id = self.next_request_id();
                self.pending.market.register(PendingSearch::new(
                    request_id,
                    query.clone(),
                    now + self.config.pending_timeout(),
                    reply,
                ));
                let request = IndexRequest::SearchMarket {
                    request_id,
                    query,
                    max_results: Some(max_results.unwrap_or(self.config.market_max_results)),
                };
                if let Err(error) = self.send_to_worker(request) {
                    tracing::warn!("market search {request_id} not dispatched: {error}");
                    self.pending.market.remove(request_id);
                }
            }
            ServiceEvent::RefreshStatus { reply } => {
                let _ = reply.send(self.send_to_worker(IndexRequest::GetStatus));
            }
            ServiceEvent::Terminate { reply } => {
                self.terminate();
                let _ = reply.send(());
            }
        }
    }

    fn handle_envelope(&mut self, envelope: WorkerEnvelope) {
        let active = self
            .worker
            .as_ref()
            .map(|worker| worker.handle.generation());
        if active != Some(envelope.generation) {
            tracing::debug!(
                "discarding response from retired index worker {}",
                envelope.generation
            );
            return;
        }
        self.handle_response(envelope.response);
    }

    fn handle_response(&mut self, response: IndexResponse) {
        match response {
            IndexResponse::CatalogIndexed { count } => {
                self.status.catalog_ready = true;
                self.status.catalog_count = count;
                self.publish_status();
            }
            IndexResponse::MarketIndexed { count } => {
                self.status.market_ready = true;
                self.status.market_count = count;
                self.publish_status();
            }
            IndexResponse::CatalogResults {
                request_id,
                query,
                results,
            } => {
                if !self.pending.catalog.resolve(request_id, results) {
                    tracing::debug!(
                        "dropping catalog results for request {request_id} query={query:?}: no longer pending"
                    );
                }
            }
            IndexResponse::MarketResults {
                request_id,
                query,
                results,
            } => {
                if !self.pending.market.resolve(request_id, results) {
                    tracing::debug!(
                        "dropping market results for request {request_id} query={query:?}: no longer pending"
                    );
                }
            }
            IndexResponse::Status(status) => {
                self.status = status;
                self.publish_status();
            }
            IndexResponse::CatalogIndexExported {
                request_id,
                snapshot,
            } => {
                if !self.pending.export.resolve(request_id, Some(snapshot)) {
                    tracing::debug!("dropping catalog export {request_id}: no longer pending");
                }
            }
            IndexResponse::CatalogIndexImported { request_id, count } => {
                self.status.catalog_ready = true;
                self.status.catalog_count = count;
                self.publish_status();
                if !self.pending.import.resolve(request_id, true) {
                    tracing::debug!("catalog import {request_id} finished after its caller left");
                }
            }
            IndexResponse::Error {
                request_id,
                message,
            } => {
                tracing::warn!("index worker error (request {request_id:?}): {message}");
                if let Some(request_id) = request_id {
                    if self.pending.fail(request_id).is_none() {
                        tracing::debug!("error for request {request_id} arrived after it expired");
                    }
                }
            }
        }
    }

    /// Evicts expired requests. Returns `now` for deadline arithmetic.
    fn sweep(&mut self, now: Instant) -> Instant {
        let report = self.pending.sweep(now);
        if !report.is_empty() {
            tracing::debug!(
                "evicted stale requests catalog={} market={} import={} export={}",
                report.catalog,
                report.market,
                report.import,
                report.export
            );
        }
        now
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        self.next_request_id
    }

    fn ensure_worker(&mut self) -> ServiceResult<mpsc::Sender<IndexRequest>> {
        if let Some(worker) = &self.worker {
            if !worker.requests.is_closed() && !worker.handle.is_finished() {
                return Ok(worker.requests.clone());
            }
            tracing::warn!(
                "index worker {} exited unexpectedly; starting a new one",
                worker.handle.generation()
            );
            self.worker = None;
            self.reset_status();
        }

        self.generation += 1;
        let (requests, request_rx) = mpsc::channel(self.config.request_capacity.max(1));
        let handle = spawn_index_worker(self.generation, request_rx, self.response_tx.clone())
            .map_err(|error| ServiceError::WorkerUnavailable(error.to_string()))?;
        tracing::info!("index worker {} started", self.generation);

        self.worker = Some(ActiveWorker {
            requests: requests.clone(),
            handle,
        });
        Ok(requests)
    }

    fn send_to_worker(&mut self, request: IndexRequest) -> ServiceResult<()> {
        let requests = self.ensure_worker()?;
        requests.try_send(request).map_err(|error| match error {
            TrySendError::Full(request) => ServiceError::WorkerUnavailable(format!(
                "request queue full, dropped {}",
                request.kind()
            )),
            TrySendError::Closed(request) => ServiceError::WorkerUnavailable(format!(
                "worker stopped before {}",
                request.kind()
            )),
        })
    }

    fn terminate(&mut self) {
        let Some(worker) = self.worker.take() else {
            tracing::debug!("terminate requested with no index worker running");
            self.reset_status();
            return;
        };

        // Dropping the sender closes the channel; the thread exits after the
        // request it is currently handling.
        let generation = worker.handle.generation();
        drop(worker);
        let failed = self.pending.clear();
        tracing::info!("index worker {generation} terminated ({failed} pending requests failed)");
        self.reset_status();
    }

    fn reset_status(&mut self) {
        self.status = IndexStatus::default();
        self.publish_status();
    }

    fn publish_status(&self) {
        self.publisher.publish(self.status);
    }
}
