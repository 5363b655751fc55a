//! Concurrent writers and readers against one store.

use obsstore::{
    Entity, FeedEvent, Gid, ListenerConfig, ProgramId, Store, StoreConfig, TargetId, Transition,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 8;
const PER_WRITER: usize = 50;

#[test]
fn test_concurrent_valid_and_invalid_transitions() {
    let store = Arc::new(Store::new(StoreConfig::default()).unwrap());
    store
        .apply(&Transition::CreateProgram { name: None })
        .unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut accepted = 0usize;
                for i in 0..PER_WRITER {
                    // Every other request points at a program that never exists.
                    let program = if i % 2 == 0 {
                        ProgramId::MIN
                    } else {
                        ProgramId::from_u64(1_000_000).unwrap()
                    };
                    let result = store.apply(&Transition::CreateTarget {
                        program_ids: vec![program],
                        name: format!("w{w}-t{i}"),
                    });
                    if result.is_ok() {
                        accepted += 1;
                    }
                }
                accepted
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let snapshot = store.snapshot();

    assert_eq!(accepted, WRITERS * PER_WRITER / 2);
    assert_eq!(snapshot.targets().len(), accepted);
    assert_eq!(snapshot.program_targets().len(), accepted);
    // One program create plus one event per accepted target.
    assert_eq!(snapshot.last_sequence().0, accepted as u64 + 1);
    // Ids were handed out densely, with none lost to rejected requests.
    let ids: Vec<u64> = snapshot.targets().keys().map(|id| id.value()).collect();
    assert_eq!(ids, (1..=accepted as u64).collect::<Vec<_>>());
    assert!(snapshot.integrity_violations().is_empty());
}

#[test]
fn test_event_sequences_are_strictly_increasing() {
    let store = Arc::new(Store::new(StoreConfig::default()).unwrap());
    let handle = store.listen(ListenerConfig {
        buffer_size: WRITERS * PER_WRITER * 2,
        ..Default::default()
    });

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    store
                        .apply(&Transition::CreateProgram { name: None })
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let mut sequences = Vec::new();
    while let Ok(FeedEvent::Edit { event }) = handle.try_recv() {
        sequences.push(event.sequence.0);
    }

    assert_eq!(sequences.len(), WRITERS * PER_WRITER);
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_readers_never_see_half_an_edit() {
    let store = Arc::new(Store::new(StoreConfig::default()).unwrap());
    store
        .apply(&Transition::CreateProgram { name: None })
        .unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                let commit = store
                    .apply(&Transition::CreateTarget {
                        program_ids: vec![],
                        name: format!("t{i}"),
                    })
                    .unwrap();
                let target = match commit.event.unwrap().payload {
                    Entity::Target(t) => t.id,
                    other => panic!("Expected target, got {:?}", other),
                };
                // Asterism, membership and both relation updates land together.
                store
                    .apply(&Transition::CreateAsterism {
                        program_ids: vec![ProgramId::MIN],
                        name: None,
                        target_ids: BTreeSet::from([target]),
                    })
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = store.snapshot();
                    assert!(snapshot.integrity_violations().is_empty());
                    for (id, asterism) in snapshot.asterisms() {
                        assert!(snapshot.program_asterisms().contains(ProgramId::MIN, *id));
                        for t in &asterism.target_ids {
                            assert!(snapshot.program_targets().contains(ProgramId::MIN, *t));
                        }
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let snapshot = store.snapshot();
    assert_eq!(snapshot.asterisms().len(), 200);
    assert_eq!(
        snapshot.program_targets().rights_of(ProgramId::MIN).count(),
        200
    );
    assert!(snapshot.target(TargetId::from_u64(200).unwrap()).is_some());
}
