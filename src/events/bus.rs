//! Event bus for broadcasting committed edits.

use crate::types::Event;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{DropReason, EventFilter, FeedEvent, ListenerConfig, ListenerHandle, ListenerId};

/// Internal listener state.
struct Listener {
    filter: EventFilter,
    sender: Sender<FeedEvent>,
}

impl Listener {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone.
    fn try_send(&self, event: FeedEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Fans committed events out to listeners.
///
/// Publishing never blocks: a listener whose buffer is full is dropped
/// and, if there is room, told why.
pub struct EventBus {
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. It sees events published after this call.
    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.listeners.write().insert(
            id,
            Listener {
                filter: config.filter,
                sender,
            },
        );

        ListenerHandle { id, receiver }
    }

    /// Remove a listener, telling it so (best effort).
    pub fn unlisten(&self, id: ListenerId) {
        if let Some(listener) = self.listeners.write().remove(&id) {
            let _ = listener.sender.try_send(FeedEvent::Dropped {
                reason: DropReason::Unlistened,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to every matching listener.
    pub fn publish(&self, event: &Event) {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if listener.filter.matches(event)
                    && !listener.try_send(FeedEvent::Edit {
                        event: event.clone(),
                    })
                {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                if let Some(listener) = listeners.remove(&id) {
                    warn!(listener = id.0, sequence = %event.sequence, "dropping slow event listener");
                    let _ = listener.sender.try_send(FeedEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
