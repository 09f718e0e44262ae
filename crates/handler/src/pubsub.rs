use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    task::{Context, Poll},
};

use futures_util::Stream;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type Listeners<T> = HashMap<String, IndexMap<u64, mpsc::UnboundedSender<T>>>;

struct Inner<T> {
    next_id: AtomicU64,
    listeners: Mutex<Listeners<T>>,
}

impl<T> Inner<T> {
    fn listeners(&self) -> MutexGuard<'_, Listeners<T>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Delivers published payloads to every active listener of a trigger.
///
/// Cloning the registry shares the listener table.
pub struct TriggerRegistry<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TriggerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for TriggerRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl<T: Clone + Send + 'static> TriggerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `payload` to every listener of `trigger` and return how many received it.
    pub fn publish(&self, trigger: &str, payload: T) -> usize {
        let mut listeners = self.inner.listeners();
        let delivered = match listeners.get_mut(trigger) {
            Some(senders) => {
                senders.retain(|_, sender| sender.send(payload.clone()).is_ok());
                let delivered = senders.len();
                if senders.is_empty() {
                    listeners.remove(trigger);
                }
                delivered
            },
            None => 0,
        };
        tracing::trace!(trigger, delivered, "Event published.");
        delivered
    }

    /// Listen to `trigger`. The listener is removed when the stream is dropped.
    pub fn subscribe(&self, trigger: impl Into<String>) -> TriggerStream<T> {
        let trigger = trigger.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners().entry(trigger.clone()).or_default().insert(id, tx);
        TriggerStream {
            inner: self.inner.clone(),
            trigger,
            id,
            receiver: UnboundedReceiverStream::new(rx),
        }
    }

    pub fn subscriber_count(&self, trigger: &str) -> usize {
        self.inner.listeners().get(trigger).map(IndexMap::len).unwrap_or_default()
    }
}

/// The events published to one trigger after the stream was created.
pub struct TriggerStream<T> {
    inner: Arc<Inner<T>>,
    trigger: String,
    id: u64,
    receiver: UnboundedReceiverStream<T>,
}

impl<T> Stream for TriggerStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl<T> Drop for TriggerStream<T> {
    fn drop(&mut self) {
        let mut listeners = self.inner.listeners();
        if let Some(senders) = listeners.get_mut(&self.trigger) {
            senders.shift_remove(&self.id);
            if senders.is_empty() {
                listeners.remove(&self.trigger);
            }
        }
    }
}
