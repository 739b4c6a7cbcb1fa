//! Topic and subscription handles

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::policy::{Backpressure, BlockOnFull};

/// Queue capacity of every subscription created by [`Topic::new`]
pub const DEFAULT_CAPACITY: usize = 32;

/// Predicate deciding whether a subscription wants a payload
pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Filter accepting every payload
pub fn filter_all<T>(_: &T) -> bool {
    true
}

struct Entry<T> {
    name: String,
    filter: Filter<T>,
    queue: mpsc::Sender<T>,
}

type Registry<T> = Mutex<BTreeMap<u64, Entry<T>>>;

/// Publish/subscribe topic over payloads of type `T`
///
/// Subscribe, unsubscribe and broadcast share one lock. A broadcast holds
/// it for the whole fan-out pass, so under [`BlockOnFull`] a saturated
/// subscriber stalls delivery to the others until it drains or goes away.
pub struct Topic<T, P = BlockOnFull> {
    registry: Arc<Registry<T>>,
    next_id: AtomicU64,
    capacity: usize,
    policy: P,
}

impl<T> Topic<T, BlockOnFull>
where
    T: Clone + Send + 'static,
{
    /// Create a topic with blocking delivery and the default queue capacity
    pub fn new() -> Self {
        Self::with_policy(BlockOnFull, DEFAULT_CAPACITY)
    }
}

impl<T> Default for Topic<T, BlockOnFull>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> Topic<T, P>
where
    T: Clone + Send + 'static,
    P: Backpressure,
{
    /// Create a topic with a custom delivery policy and queue capacity
    pub fn with_policy(policy: P, capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Register a new subscription. `name` only shows up in logs.
    pub async fn subscribe<F>(&self, name: impl Into<String>, filter: F) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);

        self.registry.lock().await.insert(
            id,
            Entry {
                name: name.clone(),
                filter: Box::new(filter),
                queue: tx,
            },
        );
        debug!(subscriber = %name, "pubsub: subscribe");

        Subscription {
            id,
            name,
            queue: rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Close the subscription's queue and remove it from the topic.
    ///
    /// The queue is closed before the lock is taken, which releases a
    /// broadcast currently waiting on this very queue.
    pub async fn unsubscribe(&self, subscription: Subscription<T>) {
        let id = subscription.id;
        let name = subscription.name().to_string();
        drop(subscription);

        self.registry.lock().await.remove(&id);
        debug!(subscriber = %name, "pubsub: unsubscribe");
    }

    /// Deliver a copy of `payload` to every live subscription whose filter accepts it
    pub async fn broadcast(&self, payload: T) {
        let mut entries = self.registry.lock().await;
        entries.retain(|_, entry| !entry.queue.is_closed());

        for entry in entries.values() {
            if (entry.filter)(&payload) {
                self.policy
                    .deliver(&entry.name, &entry.queue, payload.clone())
                    .await;
            }
        }
    }

    /// Number of registered subscriptions
    pub async fn subscriber_count(&self) -> usize {
        self.registry.lock().await.len()
    }
}

/// Handle to one subscription's private queue
///
/// Dropping the handle closes the queue; the topic forgets it right away
/// when its lock is free, otherwise on the next broadcast.
pub struct Subscription<T> {
    id: u64,
    name: String,
    queue: mpsc::Receiver<T>,
    registry: Weak<Registry<T>>,
}

impl<T> Subscription<T> {
    /// Wait for the next accepted payload. `None` once the queue is closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.queue.recv().await
    }

    /// Name given at subscribe time
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.queue.close();

        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut entries) = registry.try_lock() {
                entries.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pubsub::DropWhenFull;

    #[tokio::test]
    async fn test_filtered_delivery_in_order() {
        let topic: Topic<u32> = Topic::new();
        let mut all = topic.subscribe("all", filter_all).await;
        let mut even = topic.subscribe("even", |n: &u32| n % 2 == 0).await;
        assert_eq!(even.name(), "even");

        for n in 1..=4 {
            topic.broadcast(n).await;
        }

        for expected in 1..=4 {
            assert_eq!(all.recv().await, Some(expected));
        }
        assert_eq!(even.recv().await, Some(2));
        assert_eq!(even.recv().await, Some(4));

        topic.unsubscribe(even).await;
        assert_eq!(topic.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejected_payload_not_delivered() {
        let topic: Topic<u32> = Topic::new();
        let mut none = topic.subscribe("none", |_: &u32| false).await;

        topic.broadcast(7).await;
        drop(topic);

        assert_eq!(none.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_removed() {
        let topic: Topic<u32> = Topic::new();
        let sub = topic.subscribe("temp", filter_all).await;
        assert_eq!(topic.subscriber_count().await, 1);

        drop(sub);
        topic.broadcast(1).await;

        assert_eq!(topic.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_blocked_broadcast() {
        let topic: Arc<Topic<u32>> = Arc::new(Topic::with_policy(BlockOnFull, 1));
        let stuck = topic.subscribe("stuck", filter_all).await;
        let mut live = topic.subscribe("live", filter_all).await;

        topic.broadcast(1).await;
        assert_eq!(live.recv().await, Some(1));

        // "stuck" is full now, so this broadcast waits on it
        let broadcaster = {
            let topic = Arc::clone(&topic);
            tokio::spawn(async move { topic.broadcast(2).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!broadcaster.is_finished());

        topic.unsubscribe(stuck).await;

        tokio::time::timeout(Duration::from_secs(1), broadcaster)
            .await
            .expect("broadcast should finish")
            .unwrap();
        assert_eq!(live.recv().await, Some(2));
        assert_eq!(topic.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_drop_when_full_never_blocks() {
        let topic: Topic<u32, DropWhenFull> = Topic::with_policy(DropWhenFull, 1);
        let mut sub = topic.subscribe("slow", filter_all).await;

        topic.broadcast(1).await;
        topic.broadcast(2).await;
        drop(topic);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }
}
