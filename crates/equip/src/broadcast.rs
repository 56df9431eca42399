//! Result fan-out to subscribers.
//!
//! Subscribers are invoked synchronously, in registration order, on the
//! context that emits (the document worker). A `Subscription` guard
//! unsubscribes on drop so front ends cannot leak callbacks.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::model::EquipmentResult;

type Callback = Arc<dyn Fn(&EquipmentResult) + Send + Sync>;

/// Observer list for creation results.
#[derive(Default)]
pub struct ResultBroadcaster {
    subscribers: RwLock<Vec<(Uuid, Callback)>>,
}

impl ResultBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Dropping the returned guard unsubscribes it.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&EquipmentResult) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.subscribers.write().push((id, Arc::new(callback)));
        debug!("Added result subscriber {}", id);

        Subscription {
            id,
            broadcaster: Some(Arc::downgrade(self)),
        }
    }

    /// Receive results on a tokio channel instead of a callback.
    pub fn subscribe_channel(
        self: &Arc<Self>,
    ) -> (Subscription, mpsc::UnboundedReceiver<EquipmentResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |result| {
            if tx.send(result.clone()).is_err() {
                trace!("Result receiver dropped");
            }
        });
        (subscription, rx)
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!("Removed result subscriber {}", id);
        }
        removed
    }

    /// Deliver a result to every subscriber in registration order.
    pub fn emit(&self, result: &EquipmentResult) {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        trace!("Emitting result to {} subscribers", callbacks.len());
        for callback in callbacks {
            callback(result);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for ResultBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Guard for a registered subscriber.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    broadcaster: Option<Weak<ResultBroadcaster>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Keep the subscriber registered for the broadcaster's lifetime.
    pub fn detach(mut self) {
        self.broadcaster = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.take().and_then(|w| w.upgrade()) {
            broadcaster.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_in_registration_order() {
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            broadcaster.subscribe(move |r: &EquipmentResult| {
                log.lock().push(format!("a:{}", r.message));
            })
        };
        let second = {
            let log = log.clone();
            broadcaster.subscribe(move |r: &EquipmentResult| {
                log.lock().push(format!("b:{}", r.message));
            })
        };

        broadcaster.emit(&EquipmentResult::failed("x"));
        assert_eq!(*log.lock(), vec!["a:x", "b:x"]);
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(first);
        broadcaster.emit(&EquipmentResult::failed("y"));
        assert_eq!(*log.lock(), vec!["a:x", "b:x", "b:y"]);

        drop(second);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_subscriber() {
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let subscription = broadcaster.subscribe(|_| {});
        let id = subscription.id();
        subscription.detach();

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(broadcaster.unsubscribe(id));
        assert!(!broadcaster.unsubscribe(id));
    }

    #[test]
    fn test_guard_outliving_broadcaster() {
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let subscription = broadcaster.subscribe(|_| {});
        drop(broadcaster);
        drop(subscription);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let subscription = broadcaster.subscribe(move |_| {
            inner.lock().take();
        });
        *slot.lock() = Some(subscription);

        broadcaster.emit(&EquipmentResult::failed("once"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_subscription() {
        let broadcaster = Arc::new(ResultBroadcaster::new());
        let (subscription, mut rx) = broadcaster.subscribe_channel();

        let created = EquipmentResult::succeeded("Created T-1 with electrical parameters", 7);
        broadcaster.emit(&created);
        let result = rx.recv().await.unwrap();
        assert_eq!(result.element_id, Some(7));

        drop(subscription);
        assert!(rx.recv().await.is_none());
    }
}
