//! Index status publication.
//!
//! The service actor is the only writer. Readers either take the current
//! value, await a condition through the watch channel, or register a
//! callback that runs on every published change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use search_index::IndexStatus;
use tokio::sync::watch;

use crate::error::{ServiceError, ServiceResult};

type StatusCallback = Arc<dyn Fn(&IndexStatus) + Send + Sync>;

struct StatusInner {
    sender: watch::Sender<IndexStatus>,
    callbacks: Mutex<Vec<(u64, StatusCallback)>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct StatusPublisher {
    inner: Arc<StatusInner>,
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("current", &*self.inner.sender.borrow())
            .field("callbacks", &self.inner.callbacks.lock().len())
            .finish()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(IndexStatus::default());
        Self {
            inner: Arc::new(StatusInner {
                sender,
                callbacks: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn current(&self) -> IndexStatus {
        *self.inner.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndexStatus> {
        self.inner.sender.subscribe()
    }

    /// Stores `status` and notifies every callback, even when unchanged.
    pub fn publish(&self, status: IndexStatus) {
        self.inner.sender.send_replace(status);

        // Callbacks run outside the lock so they may unsubscribe themselves.
        let callbacks: Vec<StatusCallback> = self
            .inner
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(&status);
        }
    }

    /// Registers `callback` for every subsequent publication.
    pub fn on_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(&IndexStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.callbacks.lock().push((id, Arc::new(callback)));
        StatusSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Waits until `predicate` holds for the published status.
    pub async fn wait_for<P>(&self, predicate: P, timeout: Duration) -> ServiceResult<IndexStatus>
    where
        P: FnMut(&IndexStatus) -> bool,
    {
        let mut receiver = self.subscribe();
        let outcome = match tokio::time::timeout(timeout, receiver.wait_for(predicate)).await {
            Ok(Ok(status)) => Ok(*status),
            Ok(Err(_)) => Err(ServiceError::Internal(
                "status publisher dropped".to_string(),
            )),
            Err(_) => Err(ServiceError::Timeout("status wait")),
        };
        outcome
    }
}

/// Registration returned by [`StatusPublisher::on_change`].
///
/// Dropping it keeps the callback registered; call
/// [`StatusSubscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct StatusSubscription {
    id: u64,
    inner: Weak<StatusInner>,
}

impl StatusSubscription {
    /// Removes the callback. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut callbacks = inner.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != self.id);
        callbacks.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn ready_catalog(count: usize) -> IndexStatus {
        IndexStatus {
            catalog_ready: true,
            catalog_count: count,
            ..IndexStatus::default()
        }
    }

    #[test]
    fn starts_not_ready() {
        let publisher = StatusPublisher::new();
        assert_eq!(publisher.current(), IndexStatus::default());
    }

    #[test]
    fn callbacks_fire_until_unsubscribed() {
        let publisher = StatusPublisher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let subscription = publisher.on_change(move |status| {
            assert!(status.catalog_ready);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        publisher.publish(ready_catalog(3));
        publisher.publish(ready_catalog(4));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        publisher.publish(ready_catalog(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(publisher.current().catalog_count, 5);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let publisher = StatusPublisher::new();
        let slot: Arc<Mutex<Option<StatusSubscription>>> = Arc::new(Mutex::new(None));
        let slot_in_callback = slot.clone();
        let subscription = publisher.on_change(move |_| {
            if let Some(subscription) = slot_in_callback.lock().take() {
                subscription.unsubscribe();
            }
        });
        *slot.lock() = Some(subscription);

        publisher.publish(ready_catalog(1));
        assert!(slot.lock().is_none());
    }

    #[tokio::test]
    async fn wait_for_resolves_on_publish() {
        let publisher = StatusPublisher::new();
        let waiter = publisher.clone();
        let handle = tokio::spawn(async move {
            waiter
                .wait_for(|status| status.catalog_ready, Duration::from_secs(5))
                .await
        });

        tokio::task::yield_now().await;
        publisher.publish(ready_catalog(2));

        let status = handle.await.expect("join").expect("ready");
        assert_eq!(status.catalog_count, 2);
    }

    #[tokio::test]
    async fn wait_for_returns_current_status_when_already_satisfied() {
        let publisher = StatusPublisher::new();
        publisher.publish(ready_catalog(7));

        let status = publisher
            .wait_for(|status| status.catalog_ready, Duration::from_millis(20))
            .await
            .expect("already ready");
        assert_eq!(status, ready_catalog(7));
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let publisher = StatusPublisher::new();
        let result = publisher
            .wait_for(|status| status.market_ready, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout(_))));
    }
}
