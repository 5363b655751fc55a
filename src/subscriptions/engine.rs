//! Subscription engine multiplexing query streams onto one outbound queue.

use futures::future::join_all;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{EngineConfig, OutboundMessage, SubscriptionStatus};

/// Internal subscription state.
struct Subscription {
    task: JoinHandle<()>,
    /// Cooperative stop signal checked by the forwarding loop.
    stop: Arc<AtomicBool>,
}

impl Subscription {
    /// Signal, abort, and wait for the task to be gone.
    ///
    /// Abort only lands at an await point, so once this returns the task
    /// cannot enqueue anything else.
    async fn stop(self, id: &str) {
        self.stop.store(true, Ordering::Release);
        self.task.abort();

        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(subscription = id, error = %e, "subscription task failed"),
        }
    }
}

/// Registry of live subscriptions for one client connection.
///
/// Each subscription runs as its own Tokio task that drains an upstream
/// result stream into the shared outbound queue, tagging every item with
/// the subscription id. Items from one subscription keep their upstream
/// order; items from different subscriptions interleave freely.
///
/// The registry lock is only held to insert, remove, or swap entries and
/// never across an await.
pub struct SubscriptionEngine {
    registry: Mutex<HashMap<String, Subscription>>,
    outbound: mpsc::Sender<OutboundMessage>,
}

impl SubscriptionEngine {
    /// Create an engine feeding an existing outbound queue.
    pub fn new(outbound: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    /// Create an engine together with the receiving end of its queue.
    pub fn channel(config: &EngineConfig) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(config.outbound_capacity.max(1));
        (Self::new(sender), receiver)
    }

    /// Start forwarding `stream` under `id`.
    ///
    /// `Ok` items become [`OutboundMessage::Data`] and `Err` items become
    /// [`OutboundMessage::Error`]; an error item does not end the
    /// subscription. If `id` is already registered the old subscription is
    /// stopped first, without a `Complete`, and the new one replaces it.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn add<S, E>(&self, id: impl Into<String>, stream: S)
    where
        S: Stream<Item = Result<serde_json::Value, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let id = id.into();

        let previous = self.registry.lock().remove(&id);
        if let Some(previous) = previous {
            debug!(subscription = %id, "replacing active subscription");
            previous.stop(&id).await;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(forward(
            id.clone(),
            stream,
            Arc::clone(&stop),
            self.outbound.clone(),
        ));

        let displaced = self
            .registry
            .lock()
            .insert(id.clone(), Subscription { task, stop });
        // Only a concurrent add of the same id can land here.
        if let Some(displaced) = displaced {
            displaced.stop(&id).await;
        }

        debug!(subscription = %id, "subscription added");
    }

    /// Stop the subscription registered under `id` and send `Complete`.
    ///
    /// `Complete` is sent even when `id` is unknown. When it is known, every
    /// item the subscription managed to enqueue precedes the `Complete`.
    pub async fn remove(&self, id: &str) {
        let entry = self.registry.lock().remove(id);
        match entry {
            Some(subscription) => {
                subscription.stop(id).await;
                debug!(subscription = id, "subscription removed");
            }
            None => debug!(subscription = id, "remove of unknown subscription"),
        }

        self.complete(id).await;
    }

    /// Stop every subscription and send one `Complete` per id.
    ///
    /// The registry is swapped for an empty one first, so subscriptions
    /// added while this runs are left alone. Ids are stopped concurrently,
    /// so their `Complete` messages arrive in no particular order.
    pub async fn terminate(&self) {
        let drained = std::mem::take(&mut *self.registry.lock());
        let count = drained.len();

        join_all(drained.into_iter().map(|(id, subscription)| async move {
            subscription.stop(&id).await;
            self.complete(&id).await;
        }))
        .await;

        info!(count, "terminated subscriptions");
    }

    /// Remove entries whose task has already ended and send `Complete` for
    /// each. Returns the reaped ids.
    ///
    /// Nothing calls this automatically; until it runs, a dead task keeps
    /// its registry entry.
    pub async fn reap_finished(&self) -> Vec<String> {
        let finished: Vec<(String, Subscription)> = {
            let mut registry = self.registry.lock();
            let ids: Vec<String> = registry
                .iter()
                .filter(|(_, subscription)| subscription.task.is_finished())
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| registry.remove(&id).map(|s| (id, s)))
                .collect()
        };

        let mut reaped = Vec::with_capacity(finished.len());
        for (id, subscription) in finished {
            subscription.stop(&id).await;
            self.complete(&id).await;
            reaped.push(id);
        }

        if !reaped.is_empty() {
            debug!(count = reaped.len(), "reaped finished subscriptions");
        }
        reaped
    }

    /// Terminate everything, then drop the engine's end of the outbound
    /// queue. Once the transport has drained the queue its receiver yields
    /// `None`, which marks the connection as closed.
    pub async fn shutdown(self) {
        self.terminate().await;
    }

    pub fn status(&self, id: &str) -> Option<SubscriptionStatus> {
        self.registry.lock().get(id).map(|subscription| {
            if subscription.task.is_finished() {
                SubscriptionStatus::Finished
            } else {
                SubscriptionStatus::Active
            }
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    async fn complete(&self, id: &str) {
        let message = OutboundMessage::Complete { id: id.to_string() };
        if self.outbound.send(message).await.is_err() {
            debug!(subscription = id, "outbound queue closed, completion dropped");
        }
    }
}

impl Drop for SubscriptionEngine {
    /// Abort anything still running. No `Complete` messages are sent.
    fn drop(&mut self) {
        for subscription in self.registry.get_mut().values() {
            subscription.stop.store(true, Ordering::Release);
            subscription.task.abort();
        }
    }
}

/// Body of one subscription task.
async fn forward<S, E>(
    id: String,
    stream: S,
    stop: Arc<AtomicBool>,
    outbound: mpsc::Sender<OutboundMessage>,
) where
    S: Stream<Item = Result<serde_json::Value, E>>,
    E: fmt::Display,
{
    let mut stream = std::pin::pin!(stream);

    while !stop.load(Ordering::Acquire) {
        let Some(item) = stream.next().await else {
            debug!(subscription = %id, "upstream exhausted");
            return;
        };
        if stop.load(Ordering::Acquire) {
            break;
        }

        let message = match item {
            Ok(payload) => OutboundMessage::Data {
                id: id.clone(),
                payload,
            },
            Err(e) => OutboundMessage::Error {
                id: id.clone(),
                message: e.to_string(),
            },
        };

        if outbound.send(message).await.is_err() {
            debug!(subscription = %id, "outbound queue closed");
            return;
        }
    }

    debug!(subscription = %id, "subscription stopped");
}
