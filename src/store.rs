//! Main Store struct tying snapshot state and the event feed together.

use crate::error::{Result, StoreError, ValidationErrors};
use crate::events::{EventBus, ListenerConfig, ListenerHandle, ListenerId};
use crate::state::{apply_transition, Snapshot, DEFAULT_ID_LIMIT};
use crate::types::{Event, Transition};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Largest id handed out for each entity kind before wrapping to 1.
    pub id_limit: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_limit: DEFAULT_ID_LIMIT,
        }
    }
}

/// Outcome of an accepted transition.
#[derive(Clone, Debug)]
pub struct Commit {
    /// The snapshot that is now current.
    pub snapshot: Arc<Snapshot>,
    /// `None` if the transition changed nothing.
    pub event: Option<Event>,
}

/// The observation store.
///
/// Holds the current [`Snapshot`] behind one reference. Readers clone the
/// `Arc` and keep a consistent view for as long as they like. Writers are
/// serialized: each transition is computed from the current snapshot and
/// swapped in whole, so no reader ever sees half an edit.
pub struct Store {
    config: StoreConfig,

    /// Current snapshot.
    current: RwLock<Arc<Snapshot>>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,

    /// Feed of committed edits.
    events: EventBus,
}

impl Store {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let snapshot = Snapshot::empty(config.id_limit);
        Self::with_snapshot(config, snapshot)
    }

    /// Create a store starting from an existing snapshot, e.g. one built by
    /// a seeding routine.
    ///
    /// The snapshot's id limit must match `config.id_limit`.
    pub fn with_snapshot(config: StoreConfig, snapshot: Snapshot) -> Result<Self> {
        if config.id_limit == 0 {
            return Err(StoreError::InvalidConfig(
                "id_limit must be at least 1".to_string(),
            ));
        }
        if snapshot.id_limit() != config.id_limit {
            return Err(StoreError::InvalidConfig(format!(
                "snapshot id_limit {} does not match configured {}",
                snapshot.id_limit(),
                config.id_limit
            )));
        }

        Ok(Self {
            config,
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
            events: EventBus::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Point-in-time view of the whole store.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Validate and commit a transition.
    ///
    /// On rejection the current snapshot is unchanged and every validation
    /// error is returned.
    pub fn apply(&self, transition: &Transition) -> Result<Commit> {
        let commit = self.modify(|snapshot| apply_transition(snapshot, transition))?;
        if let Some(ref event) = commit.event {
            debug!(
                sequence = %event.sequence,
                edit_type = ?event.edit_type,
                id = %event.payload.id(),
                "transition committed"
            );
        }
        Ok(commit)
    }

    /// Commit a transition function.
    ///
    /// `f` runs once, under the write lock, against the current snapshot.
    /// It must be pure and must not block. A candidate is refused unless it
    /// keeps the current sequence without an event, or advances it by
    /// exactly one with an event carrying the new sequence.
    pub(crate) fn modify<F>(&self, f: F) -> Result<Commit>
    where
        F: FnOnce(&Snapshot) -> std::result::Result<(Snapshot, Option<Event>), ValidationErrors>,
    {
        let _lock = self.write_lock.lock();

        let current = self.snapshot();
        let (next, event) = f(&*current).map_err(|errors| {
            debug!(errors = %errors, "transition rejected");
            StoreError::Validation(errors)
        })?;

        let advances = match event {
            Some(ref event) => {
                event.sequence == next.last_sequence()
                    && next.last_sequence() == current.last_sequence().next()
            }
            None => next.last_sequence() == current.last_sequence(),
        };
        if !advances {
            return Err(StoreError::SequenceRegression {
                current: current.last_sequence(),
                candidate: next.last_sequence(),
            });
        }

        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);

        // Publishing under the write lock keeps the feed in sequence order.
        if let Some(ref event) = event {
            self.events.publish(event);
        }

        Ok(Commit {
            snapshot: next,
            event,
        })
    }

    // --- Event Feed ---

    /// Listen for committed edits.
    pub fn listen(&self, config: ListenerConfig) -> ListenerHandle {
        self.events.listen(config)
    }

    pub fn unlisten(&self, id: ListenerId) {
        self.events.unlisten(id)
    }

    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FeedEvent;
    use crate::types::{EditType, EntityId, Gid, ProgramId, Sequence};
    use std::time::Duration;

    #[test]
    fn test_zero_id_limit_is_rejected() {
        let result = Store::new(StoreConfig { id_limit: 0 });
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_apply_swaps_snapshot() {
        let store = Store::new(StoreConfig::default()).unwrap();
        let before = store.snapshot();

        let commit = store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();

        assert!(before.programs().is_empty());
        assert_eq!(store.snapshot().programs().len(), 1);
        assert!(Arc::ptr_eq(&commit.snapshot, &store.snapshot()));
    }

    #[test]
    fn test_rejected_apply_keeps_snapshot() {
        let store = Store::new(StoreConfig::default()).unwrap();
        let before = store.snapshot();

        let result = store.apply(&Transition::EditProgram {
            id: ProgramId::MIN,
            name: None,
        });

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_apply_publishes_event() {
        let store = Store::new(StoreConfig::default()).unwrap();
        let handle = store.listen(ListenerConfig::default());

        store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();

        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            FeedEvent::Edit { event } => assert_eq!(event.edit_type, EditType::Created),
            other => panic!("Expected Edit event, got {:?}", other),
        }
    }

    #[test]
    fn test_with_snapshot_rejects_id_limit_mismatch() {
        let result = Store::with_snapshot(StoreConfig { id_limit: 8 }, Snapshot::empty(4));
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));

        let store = Store::with_snapshot(StoreConfig { id_limit: 4 }, Snapshot::empty(4)).unwrap();
        assert_eq!(store.snapshot().id_limit(), store.config().id_limit);
    }

    #[test]
    fn test_modify_refuses_rollback_to_older_snapshot() {
        let store = Store::new(StoreConfig::default()).unwrap();
        let first = store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap()
            .snapshot;
        store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();
        let handle = store.listen(ListenerConfig::default());

        let result = store.modify(|_| Ok(((*first).clone(), None)));
        assert!(matches!(
            result,
            Err(StoreError::SequenceRegression {
                current: Sequence(2),
                candidate: Sequence(1),
            })
        ));
        assert_eq!(store.snapshot().last_sequence(), Sequence(2));

        let commit = store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();
        let event = commit.event.unwrap();
        assert_eq!(event.sequence, Sequence(3));
        assert_eq!(event.payload.id(), EntityId::from(ProgramId::from_u64(3).unwrap()));

        match handle.recv_timeout(Duration::from_millis(100)).unwrap() {
            FeedEvent::Edit { event } => assert_eq!(event.sequence, Sequence(3)),
            other => panic!("Expected Edit event, got {:?}", other),
        }
    }

    #[test]
    fn test_modify_refuses_event_out_of_step() {
        let store = Store::new(StoreConfig::default()).unwrap();
        let commit = store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();
        let stale = commit.event.unwrap();

        // The snapshot advances but the event repeats an old sequence.
        let result = store.modify(|current| {
            let (next, _) = apply_transition(current, &Transition::CreateProgram { name: None })?;
            Ok((next, Some(stale.clone())))
        });

        assert!(matches!(result, Err(StoreError::SequenceRegression { .. })));
        assert_eq!(store.snapshot().programs().len(), 1);
    }

    #[test]
    fn test_no_event_no_publish() {
        let store = Store::new(StoreConfig::default()).unwrap();
        store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();
        store.apply(&Transition::delete(ProgramId::MIN)).unwrap();

        let handle = store.listen(ListenerConfig::default());
        let commit = store.apply(&Transition::delete(ProgramId::MIN)).unwrap();

        assert!(commit.event.is_none());
        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
