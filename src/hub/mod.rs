// Subscriber registry and fan-out
pub mod server;
pub mod session;

pub use server::SubscriberServer;

use crate::models::OutboundMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// Serialized message as queued for subscribers; shared, not copied, per recipient
pub type Payload = Arc<str>;

/// Handle returned by [`Hub::register`]
///
/// The receiver yields `None` once the hub has unregistered the subscriber
/// and every queued message has been drained.
pub struct Subscription {
    pub id: SubscriberId,
    pub queue: mpsc::Receiver<Payload>,
}

struct SubscriberEntry {
    queue: mpsc::Sender<Payload>,
    evicted: AtomicBool,
}

/// Registry of connected subscribers
///
/// Register/unregister take the write lock, broadcast takes the read lock.
/// Enqueueing never blocks: a subscriber whose queue is full is evicted.
#[derive(Clone)]
pub struct Hub {
    subscribers: Arc<RwLock<HashMap<SubscriberId, SubscriberEntry>>>,
    queue_capacity: usize,
}

impl Hub {
    /// # Arguments
    /// * `queue_capacity` - Outbound queue size per subscriber
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subscribers.insert(
            id,
            SubscriberEntry {
                queue: tx,
                evicted: AtomicBool::new(false),
            },
        );
        tracing::info!(subscriber = %id, total = subscribers.len(), "Subscriber registered");

        Subscription { id, queue: rx }
    }

    /// Remove a subscriber and close its queue. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match removed {
            Some(_) => {
                // dropping the sender closes the queue
                tracing::info!(subscriber = %id, "Subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Serialize once and enqueue on every subscriber
    ///
    /// Returns the number of subscribers the message was queued for.
    pub fn broadcast(&self, message: &OutboundMessage) -> usize {
        match serde_json::to_string(message) {
            Ok(json) => self.broadcast_payload(Payload::from(json)),
            Err(e) => {
                tracing::error!("Failed to serialize broadcast message: {}", e);
                0
            }
        }
    }

    pub fn broadcast_payload(&self, payload: Payload) -> usize {
        tracing::debug!("Broadcasting: {}", payload);

        let mut delivered = 0;
        let mut overflowed = Vec::new();
        {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for (id, entry) in subscribers.iter() {
                if entry.evicted.load(Ordering::Acquire) {
                    continue;
                }

                match entry.queue.try_send(payload.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = %id, "Outbound queue full, disconnecting slow subscriber");
                        entry.evicted.store(true, Ordering::Release);
                        overflowed.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        entry.evicted.store(true, Ordering::Release);
                        overflowed.push(*id);
                    }
                }
            }
        }

        for id in overflowed {
            self.schedule_unregister(id);
        }

        delivered
    }

    /// Unregister off the broadcast path when a runtime is available
    fn schedule_unregister(&self, id: SubscriberId) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let hub = self.clone();
                handle.spawn(async move {
                    hub.unregister(id);
                });
            }
            Err(_) => {
                self.unregister(id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Unregister everyone, closing every queue. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let count = subscribers.len();
        subscribers.clear();
        count
    }
}
