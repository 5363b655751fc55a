//! Event feed types.

use crate::types::{EditType, EntityKind, Event};
use serde::{Deserialize, Serialize};

/// Configuration for a feed listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Max buffered events before the listener is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: EventFilter,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: EventFilter::default(),
        }
    }
}

/// Filter criteria for listeners. `None` matches everything.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<EntityKind>>,
    pub edit_types: Option<Vec<EditType>>,
}

impl EventFilter {
    /// Every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Events whose payload is one of `kinds`.
    pub fn kinds(kinds: Vec<EntityKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    pub fn edit_types(edit_types: Vec<EditType>) -> Self {
        Self {
            edit_types: Some(edit_types),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.payload.kind()) {
                return false;
            }
        }

        if let Some(ref edit_types) = self.edit_types {
            if !edit_types.contains(&event.edit_type) {
                return false;
            }
        }

        true
    }
}

/// What a listener receives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A transition was committed.
    Edit { event: Event },

    /// The listener was removed; nothing follows.
    Dropped { reason: DropReason },
}

/// Why a listener was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly removed.
    Unlistened,
}

/// Unique identifier for a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Receiving end of a listener.
pub struct ListenerHandle {
    pub id: ListenerId,
    pub receiver: crossbeam_channel::Receiver<FeedEvent>,
}

impl ListenerHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
