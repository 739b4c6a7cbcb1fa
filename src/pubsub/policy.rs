//! Delivery policies applied when a subscriber queue is saturated

use std::future::Future;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// How a topic hands one payload to one subscriber queue.
///
/// Called while the topic's broadcast lock is held, so a policy that waits
/// delays delivery to every other subscriber of the same broadcast.
pub trait Backpressure: Send + Sync + 'static {
    fn deliver<T: Send>(
        &self,
        subscriber: &str,
        queue: &mpsc::Sender<T>,
        payload: T,
    ) -> impl Future<Output = ()> + Send;
}

/// Wait for room in a full queue. A queue closed while waiting
/// silently discards the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockOnFull;

impl Backpressure for BlockOnFull {
    async fn deliver<T: Send>(&self, subscriber: &str, queue: &mpsc::Sender<T>, payload: T) {
        if queue.capacity() == 0 {
            warn!(subscriber, "pubsub: broadcast: queue is full, will block");
        }

        if queue.send(payload).await.is_err() {
            debug!(subscriber, "pubsub: broadcast: queue closed, payload discarded");
        }
    }
}

/// Never wait: a payload for a full queue is dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct DropWhenFull;

impl Backpressure for DropWhenFull {
    async fn deliver<T: Send>(&self, subscriber: &str, queue: &mpsc::Sender<T>, payload: T) {
        match queue.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(subscriber, "pubsub: broadcast: queue is full, payload dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber, "pubsub: broadcast: queue closed, payload discarded");
            }
        }
    }
}
