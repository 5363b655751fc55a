//! Subscription engine behaviour under realistic use.

use futures::channel::mpsc as upstream;
use futures::{stream, StreamExt};
use obsstore::{
    EngineConfig, FeedEvent, ListenerConfig, OutboundMessage, Store, StoreConfig,
    SubscriptionEngine, SubscriptionStatus, Transition,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

type Item = Result<serde_json::Value, String>;

async fn next(rx: &mut mpsc::Receiver<OutboundMessage>) -> OutboundMessage {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for outbound message")
        .expect("outbound queue closed")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn complete(id: &str) -> OutboundMessage {
    OutboundMessage::Complete { id: id.to_string() }
}

#[tokio::test]
async fn test_error_stays_with_its_subscription() {
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());

    let failing = stream::iter(vec![Item::Err("type mismatch".to_string())]).chain(stream::pending());
    let healthy = stream::iter(vec![Item::Ok(json!({"n": 1}))]).chain(stream::pending());
    engine.add("bad", failing).await;
    engine.add("good", healthy).await;

    let mut received = vec![next(&mut rx).await, next(&mut rx).await];
    received.sort_by(|a, b| a.id().cmp(b.id()));

    assert_eq!(
        received,
        vec![
            OutboundMessage::Error {
                id: "bad".to_string(),
                message: "type mismatch".to_string(),
            },
            OutboundMessage::Data {
                id: "good".to_string(),
                payload: json!({"n": 1}),
            },
        ]
    );
    // Both subscriptions are still alive.
    assert_eq!(engine.len(), 2);
}

#[tokio::test]
async fn test_panicked_subscription_stays_until_reaped() {
    init_tracing();
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());

    let crashing = stream::iter(vec![1, 2]).map(|n: i64| -> Item {
        if n == 2 {
            panic!("evaluator crashed");
        }
        Ok(json!(n))
    });
    let (steady_tx, steady_rx) = upstream::unbounded::<Item>();
    engine.add("crashing", crashing).await;
    engine.add("steady", steady_rx).await;

    assert_eq!(
        next(&mut rx).await,
        OutboundMessage::Data {
            id: "crashing".to_string(),
            payload: json!(1),
        }
    );

    timeout(Duration::from_secs(2), async {
        while engine.status("crashing") != Some(SubscriptionStatus::Finished) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task never finished");
    // The dead task keeps its entry until reaped.
    assert!(engine.contains("crashing"));

    steady_tx.unbounded_send(Ok(json!("still here"))).unwrap();
    assert_eq!(
        next(&mut rx).await,
        OutboundMessage::Data {
            id: "steady".to_string(),
            payload: json!("still here"),
        }
    );

    assert_eq!(engine.reap_finished().await, vec!["crashing".to_string()]);
    assert_eq!(next(&mut rx).await, complete("crashing"));
    assert!(!engine.contains("crashing"));
    assert_eq!(engine.status("steady"), Some(SubscriptionStatus::Active));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_terminate_completes_every_subscription() {
    init_tracing();
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());
    let ids: Vec<String> = (0..5).map(|i| format!("sub-{i}")).collect();
    for id in &ids {
        engine.add(id.clone(), stream::pending::<Item>()).await;
    }

    engine.terminate().await;

    let mut completed = BTreeSet::new();
    for _ in 0..ids.len() {
        match next(&mut rx).await {
            OutboundMessage::Complete { id } => {
                assert!(completed.insert(id), "duplicate Complete");
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    assert_eq!(completed, ids.into_iter().collect::<BTreeSet<_>>());
    assert!(engine.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_remove_twice_completes_twice() {
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());
    engine.add("q", stream::pending::<Item>()).await;

    engine.remove("q").await;
    engine.remove("q").await;

    assert_eq!(next(&mut rx).await, complete("q"));
    assert_eq!(next(&mut rx).await, complete("q"));
}

#[tokio::test]
async fn test_duplicate_add_stops_previous_subscription() {
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());
    let (old_tx, old_rx) = upstream::unbounded::<Item>();
    let (new_tx, new_rx) = upstream::unbounded::<Item>();

    engine.add("q", old_rx).await;
    engine.add("q", new_rx).await;

    // The old task is gone and dropped its upstream.
    assert!(old_tx.is_closed());
    assert_eq!(engine.len(), 1);

    new_tx.unbounded_send(Ok(json!("fresh"))).unwrap();
    assert_eq!(
        next(&mut rx).await,
        OutboundMessage::Data {
            id: "q".to_string(),
            payload: json!("fresh"),
        }
    );
    // No Complete was sent for the replaced instance.
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nothing_follows_complete() {
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig {
        outbound_capacity: 4,
    });
    let engine = Arc::new(engine);

    engine.add("flood", stream::repeat(Item::Ok(json!(1)))).await;
    assert!(matches!(next(&mut rx).await, OutboundMessage::Data { .. }));

    let remover = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.remove("flood").await })
    };

    loop {
        match next(&mut rx).await {
            OutboundMessage::Data { .. } => continue,
            OutboundMessage::Complete { id } => {
                assert_eq!(id, "flood");
                break;
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }
    remover.await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_results_follow_store_edits() {
    init_tracing();
    let store = Arc::new(Store::new(StoreConfig::default()).unwrap());
    let (engine, mut rx) = SubscriptionEngine::channel(&EngineConfig::default());

    // Stand-in for the query layer: re-evaluate "number of programs" on
    // every committed edit.
    let listener = store.listen(ListenerConfig::default());
    let (results_tx, results_rx) = upstream::unbounded::<Item>();
    let evaluator = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            while let Ok(FeedEvent::Edit { event }) = listener.recv() {
                let count = store.snapshot().programs().len();
                let result = Ok(json!({"sequence": event.sequence.0, "programs": count}));
                if results_tx.unbounded_send(result).is_err() {
                    break;
                }
            }
        })
    };

    engine.add("program-count", results_rx).await;

    for _ in 0..3 {
        store
            .apply(&Transition::CreateProgram { name: None })
            .unwrap();
    }

    for expected in 1..=3u64 {
        match next(&mut rx).await {
            OutboundMessage::Data { id, payload } => {
                assert_eq!(id, "program-count");
                assert_eq!(payload["sequence"], json!(expected));
            }
            other => panic!("Expected Data, got {:?}", other),
        }
    }

    engine.remove("program-count").await;
    assert_eq!(next(&mut rx).await, complete("program-count"));

    // The removed subscription dropped its upstream, so the next edit
    // stops the evaluator.
    store
        .apply(&Transition::CreateProgram { name: None })
        .unwrap();
    tokio::task::spawn_blocking(move || evaluator.join())
        .await
        .unwrap()
        .unwrap();
}
