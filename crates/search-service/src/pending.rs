//! Bookkeeping for requests awaiting a worker response.
//!
//! Each operation type is tracked on its own. Searches queue up and are
//! matched by request id; import and export hold a single slot, and a newer
//! request displaces the older one. Every entry carries a deadline: expired
//! searches are dropped without an answer, expired slots resolve with their
//! failure value.

use search_index::{CatalogItem, IndexSnapshot, MarketItem, RequestId};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A search awaiting its results.
#[derive(Debug)]
pub struct PendingSearch<T> {
    pub request_id: RequestId,
    pub query: String,
    pub deadline: Instant,
    reply: oneshot::Sender<Vec<T>>,
}

impl<T> PendingSearch<T> {
    pub fn new(
        request_id: RequestId,
        query: String,
        deadline: Instant,
        reply: oneshot::Sender<Vec<T>>,
    ) -> Self {
        Self {
            request_id,
            query,
            deadline,
            reply,
        }
    }
}

#[derive(Debug)]
pub struct SearchQueue<T> {
    entries: Vec<PendingSearch<T>>,
}

impl<T> Default for SearchQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> SearchQueue<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn register(&mut self, pending: PendingSearch<T>) {
        self.entries.push(pending);
    }

    /// Answers the request with `request_id`. Returns `false` if it is no
    /// longer pending.
    pub fn resolve(&mut self, request_id: RequestId, results: Vec<T>) -> bool {
        let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.request_id == request_id)
        else {
            return false;
        };
        let entry = self.entries.swap_remove(position);
        // The caller may have stopped waiting; nothing to do then.
        let _ = entry.reply.send(results);
        true
    }

    /// Drops a request without answering it.
    pub fn remove(&mut self, request_id: RequestId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.request_id != request_id);
        self.entries.len() != before
    }

    /// Drops every request whose deadline has passed. Returns how many.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if entry.deadline <= now {
                tracing::debug!(
                    "evicting stale search request {} query={:?}",
                    entry.request_id,
                    entry.query
                );
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

/// A single-slot request. `T::default()` is the failure value delivered on
/// timeout, displacement or error.
#[derive(Debug)]
pub struct PendingSlot<T: Default> {
    pub request_id: RequestId,
    pub deadline: Instant,
    reply: oneshot::Sender<T>,
}

impl<T: Default> PendingSlot<T> {
    pub fn new(request_id: RequestId, deadline: Instant, reply: oneshot::Sender<T>) -> Self {
        Self {
            request_id,
            deadline,
            reply,
        }
    }

    fn resolve(self, value: T) {
        let _ = self.reply.send(value);
    }

    fn fail(self) {
        self.resolve(T::default());
    }
}

#[derive(Debug)]
pub struct SlotTracker<T: Default> {
    slot: Option<PendingSlot<T>>,
}

impl<T: Default> Default for SlotTracker<T> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<T: Default> SlotTracker<T> {
    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.slot.as_ref().map(|slot| slot.request_id)
    }

    /// Installs `pending`, failing any request it displaces.
    pub fn install(&mut self, pending: PendingSlot<T>) {
        if let Some(displaced) = self.slot.replace(pending) {
            tracing::debug!("request {} displaced by a newer one", displaced.request_id);
            displaced.fail();
        }
    }

    /// Answers the slot if it holds `request_id`.
    pub fn resolve(&mut self, request_id: RequestId, value: T) -> bool {
        match self.slot.take() {
            Some(slot) if slot.request_id == request_id => {
                slot.resolve(value);
                true
            }
            other => {
                self.slot = other;
                false
            }
        }
    }

    /// Fails the slot if it holds `request_id`.
    pub fn fail(&mut self, request_id: RequestId) -> bool {
        self.resolve(request_id, T::default())
    }

    /// Fails the slot if its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.slot.take() {
            Some(slot) if slot.deadline <= now => {
                slot.fail();
                true
            }
            other => {
                self.slot = other;
                false
            }
        }
    }

    pub fn clear(&mut self) -> bool {
        match self.slot.take() {
            Some(slot) => {
                slot.fail();
                true
            }
            None => false,
        }
    }
}

/// Which pending operation a request id belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    CatalogSearch,
    MarketSearch,
    Import,
    Export,
}

/// Counts of requests removed by a sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub catalog: usize,
    pub market: usize,
    pub import: bool,
    pub export: bool,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.catalog == 0 && self.market == 0 && !self.import && !self.export
    }
}

/// All requests awaiting the worker.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pub catalog: SearchQueue<CatalogItem>,
    pub market: SearchQueue<MarketItem>,
    pub import: SlotTracker<bool>,
    pub export: SlotTracker<Option<IndexSnapshot>>,
}

impl PendingRequests {
    pub fn len(&self) -> usize {
        self.catalog.len()
            + self.market.len()
            + usize::from(self.import.is_pending())
            + usize::from(self.export.is_pending())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails whichever request carries `request_id`. Searches are dropped,
    /// slots resolve with their failure value.
    pub fn fail(&mut self, request_id: RequestId) -> Option<PendingKind> {
        if self.import.fail(request_id) {
            Some(PendingKind::Import)
        } else if self.export.fail(request_id) {
            Some(PendingKind::Export)
        } else if self.catalog.remove(request_id) {
            Some(PendingKind::CatalogSearch)
        } else if self.market.remove(request_id) {
            Some(PendingKind::MarketSearch)
        } else {
            None
        }
    }

    pub fn sweep(&mut self, now: Instant) -> SweepReport {
        SweepReport {
            catalog: self.catalog.evict_expired(now),
            market: self.market.evict_expired(now),
            import: self.import.expire(now),
            export: self.export.expire(now),
        }
    }

    /// Fails everything; used when the worker is torn down.
    pub fn clear(&mut self) -> usize {
        self.catalog.clear()
            + self.market.clear()
            + usize::from(self.import.clear())
            + usize::from(self.export.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn search<T>(
        request_id: RequestId,
        query: &str,
        deadline: Instant,
    ) -> (PendingSearch<T>, oneshot::Receiver<Vec<T>>) {
        let (reply, receiver) = oneshot::channel();
        (
            PendingSearch::new(request_id, query.to_string(), deadline, reply),
            receiver,
        )
    }

    #[test]
    fn identical_queries_resolve_independently() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut queue = SearchQueue::<MarketItem>::default();
        let (first, mut first_rx) = search(1, "dom", deadline);
        let (second, mut second_rx) = search(2, "dom", deadline);
        queue.register(first);
        queue.register(second);

        assert!(queue.resolve(2, Vec::new()));
        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().expect("second answered"), Vec::new());
        assert_eq!(queue.len(), 1);

        assert!(queue.resolve(1, Vec::new()));
        assert!(first_rx.try_recv().is_ok());
        assert!(!queue.resolve(1, Vec::new()));
    }

    #[test]
    fn expired_searches_are_dropped_without_answer() {
        let now = Instant::now();
        let mut queue = SearchQueue::<CatalogItem>::default();
        let (stale, mut stale_rx) = search(1, "top", now);
        let (fresh, mut fresh_rx) = search(2, "top h", now + Duration::from_secs(5));
        queue.register(stale);
        queue.register(fresh);

        assert_eq!(queue.evict_expired(now + Duration::from_millis(1)), 1);
        assert!(matches!(
            stale_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            fresh_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
        assert!(!queue.resolve(1, Vec::new()));
        assert!(queue.resolve(2, Vec::new()));
    }

    #[test]
    fn slot_times_out_with_failure_value() {
        let now = Instant::now();
        let mut tracker = SlotTracker::<bool>::default();
        let (reply, mut receiver) = oneshot::channel();
        tracker.install(PendingSlot::new(7, now + Duration::from_secs(10), reply));

        assert!(!tracker.expire(now + Duration::from_secs(9)));
        assert!(tracker.is_pending());
        assert!(tracker.expire(now + Duration::from_secs(10)));
        assert!(!receiver.try_recv().expect("resolved"));
        assert!(!tracker.is_pending());
    }

    #[test]
    fn newer_slot_request_displaces_older() {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut tracker = SlotTracker::<Option<IndexSnapshot>>::default();
        let (first_reply, mut first_rx) = oneshot::channel();
        let (second_reply, _second_rx) = oneshot::channel();
        tracker.install(PendingSlot::new(1, deadline, first_reply));
        tracker.install(PendingSlot::new(2, deadline, second_reply));

        assert_eq!(first_rx.try_recv().expect("displaced"), None);
        assert_eq!(tracker.request_id(), Some(2));
        assert!(!tracker.resolve(1, None));
        assert_eq!(tracker.request_id(), Some(2));
    }

    #[test]
    fn fail_routes_by_request_id() {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut pending = PendingRequests::default();
        let (import_reply, mut import_rx) = oneshot::channel();
        pending
            .import
            .install(PendingSlot::new(4, deadline, import_reply));
        let (catalog, _catalog_rx) = search(5, "top", deadline);
        pending.catalog.register(catalog);
        assert_eq!(pending.len(), 2);

        assert_eq!(pending.fail(4), Some(PendingKind::Import));
        assert!(!import_rx.try_recv().expect("failed import"));
        assert_eq!(pending.fail(5), Some(PendingKind::CatalogSearch));
        assert_eq!(pending.fail(6), None);
        assert!(pending.is_empty());
    }

    #[test]
    fn sweep_reports_each_operation() {
        let now = Instant::now();
        let mut pending = PendingRequests::default();
        let (market, _market_rx) = search(1, "dom", now);
        pending.market.register(market);
        let (export_reply, mut export_rx) = oneshot::channel();
        pending
            .export
            .install(PendingSlot::new(2, now, export_reply));

        let report = pending.sweep(now);
        assert_eq!(
            report,
            SweepReport {
                catalog: 0,
                market: 1,
                import: false,
                export: true,
            }
        );
        assert_eq!(export_rx.try_recv().expect("export failed"), None);
        assert!(pending.sweep(now).is_empty());
    }
}
