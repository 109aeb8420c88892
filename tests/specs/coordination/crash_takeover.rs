// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An instance that dies holding a lock does not block the batch forever.

use crate::prelude::*;
use std::time::Duration;
use tandem_core::{Event, InstanceId, InstanceStatus, TakeoverReason};
use tandem_store::CoordinationStore;

#[tokio::test]
async fn survivor_takes_over_after_heartbeat_timeout() {
    let (store, clock) = shared_store();
    let a = instance(&store, "A").await;
    let b = instance(&store, "B").await;
    let mut events = b.subscribe();

    // A acquires and then stops heartbeating without releasing
    let guard = a.acquire_lock("batch-42", "score", Duration::ZERO).await.unwrap();
    std::mem::forget(guard);

    // B keeps heartbeating, A does not
    clock.advance(Duration::from_secs(60));
    b.heartbeat().await.unwrap();
    let busy = b
        .acquire_lock("batch-42", "score", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(busy.is_busy());

    clock.advance(Duration::from_secs(31));
    b.heartbeat().await.unwrap();
    let guard = b
        .acquire_lock("batch-42", "score", Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(guard.expires_at() - guard.acquired_at(), chrono::Duration::seconds(300));
    let takeover: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| e.matches("lock:takeover"))
        .collect();
    assert_eq!(
        takeover,
        vec![Event::LockTakeover {
            batch_id: "batch-42".to_string(),
            previous_holder: InstanceId::new("A"),
            new_holder: InstanceId::new("B"),
            reason: TakeoverReason::HolderDead,
        }]
    );
    guard.release().await.unwrap();
}

#[tokio::test]
async fn reaper_frees_locks_of_dead_instance() {
    let (store, clock) = shared_store();
    let a = instance(&store, "A").await;
    let b = instance(&store, "B").await;
    let mut events = b.subscribe();

    std::mem::forget(a.acquire_lock("batch-1", "score", Duration::ZERO).await.unwrap());
    std::mem::forget(a.acquire_lock("batch-2", "score", Duration::ZERO).await.unwrap());

    clock.advance(Duration::from_secs(120));
    b.heartbeat().await.unwrap();

    assert_eq!(b.cleanup_dead_instances().await.unwrap(), 1);

    let record = store.get_instance(&InstanceId::new("A")).await.unwrap().unwrap();
    assert_eq!(record.record.status, InstanceStatus::Stopped);
    assert!(store.scan_locks(None).await.unwrap().is_empty());
    assert_eq!(
        drain_names(&mut events),
        vec!["lock:force_released", "lock:force_released", "instance:reaped"]
    );

    let active: Vec<String> = b
        .get_active_instances()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.instance_id.to_string())
        .collect();
    assert_eq!(active, vec!["B"]);
}

#[tokio::test]
async fn expired_lease_is_taken_over_even_from_live_holder() {
    let (store, clock) = shared_store();
    let a = instance(&store, "A").await;
    let b = instance(&store, "B").await;

    let stale = a.acquire_lock("batch-42", "score", Duration::ZERO).await.unwrap();

    // Both keep heartbeating, but A never refreshes its lease
    for _ in 0..11 {
        clock.advance(Duration::from_secs(30));
        a.heartbeat().await.unwrap();
        b.heartbeat().await.unwrap();
    }
    let guard = b
        .acquire_lock("batch-42", "score", Duration::ZERO)
        .await
        .unwrap();

    // A's stale guard cannot release B's lock
    assert!(!stale.release().await.unwrap());
    assert!(b.is_lock_held_by_me("batch-42").await.unwrap());
    guard.release().await.unwrap();
}
