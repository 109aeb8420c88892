// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{coordinator_with, started, store, test_config};
use tandem_core::{BatchLock, Clock, Instance};

#[tokio::test]
async fn reaps_stale_instance_and_its_locks() {
    let (store, clock) = store();
    let crashed = started(&store, "node-x").await;
    let survivor = started(&store, "node-y").await;
    let guard = crashed.acquire_lock("batch_7", "score", Duration::ZERO).await.unwrap();
    std::mem::forget(guard);

    clock.advance(Duration::from_secs(90));
    survivor.heartbeat().await.unwrap();
    let mut events = survivor.subscribe();

    assert_eq!(survivor.cleanup_dead_instances().await.unwrap(), 1);

    let record = store
        .get_instance(&InstanceId::new("node-x"))
        .await
        .unwrap()
        .unwrap()
        .record;
    assert_eq!(record.status, InstanceStatus::Stopped);
    assert!(store.get_lock("batch_7").await.unwrap().is_none());

    let names: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["lock:force_released", "instance:reaped"]);
}

#[tokio::test]
async fn live_instances_are_left_alone() {
    let (store, clock) = store();
    let a = started(&store, "node-1").await;
    let b = started(&store, "node-2").await;
    let _guard = b.acquire_lock("b1", "score", Duration::ZERO).await.unwrap();

    clock.advance(Duration::from_secs(89));

    assert_eq!(a.cleanup_dead_instances().await.unwrap(), 0);
    assert!(store.get_lock("b1").await.unwrap().is_some());
}

#[tokio::test]
async fn never_reaps_itself() {
    let (store, clock) = store();
    let node = started(&store, "node-1").await;

    clock.advance(Duration::from_secs(600));

    assert_eq!(node.cleanup_dead_instances().await.unwrap(), 0);
}

#[tokio::test]
async fn second_sweep_finds_nothing() {
    let (store, clock) = store();
    let _dead = started(&store, "node-x").await;
    let reaper = started(&store, "node-y").await;

    clock.advance(Duration::from_secs(120));

    assert_eq!(reaper.cleanup_dead_instances().await.unwrap(), 1);
    assert_eq!(reaper.cleanup_dead_instances().await.unwrap(), 0);
}

#[tokio::test]
async fn lock_taken_over_before_reap_is_kept() {
    let (store, clock) = store();
    let reaper = started(&store, "node-y").await;
    let now = clock.utc_now();
    let dead = Instance::register(InstanceId::new("node-x"), "h", "1", now);
    store.insert_instance(dead);
    // The reaper only deletes locks still held by the dead instance
    store.insert_lock(BatchLock::new(
        "b1",
        InstanceId::new("node-z"),
        "score",
        now,
        Duration::from_secs(300),
    ));

    clock.advance(Duration::from_secs(100));
    reaper.heartbeat().await.unwrap();

    assert_eq!(reaper.cleanup_dead_instances().await.unwrap(), 1);
    assert!(store.get_lock("b1").await.unwrap().is_some());
}

#[tokio::test]
async fn revived_instance_is_not_reaped_again_until_stale() {
    let (store, clock) = store();
    let revived = started(&store, "node-x").await;
    let reaper = started(&store, "node-y").await;

    clock.advance(Duration::from_secs(100));
    reaper.heartbeat().await.unwrap();
    assert_eq!(reaper.cleanup_dead_instances().await.unwrap(), 1);

    revived.heartbeat().await.unwrap();
    assert_eq!(reaper.cleanup_dead_instances().await.unwrap(), 0);
    assert_eq!(reaper.get_active_instances().await.unwrap().len(), 2);
}

#[tokio::test]
async fn dead_holder_lock_is_acquirable_after_reap() {
    let (store, clock) = store();
    let crashed = started(&store, "node-x").await;
    let survivor = started(&store, "node-y").await;
    std::mem::forget(crashed.acquire_lock("batch_7", "score", Duration::ZERO).await.unwrap());

    clock.advance(Duration::from_secs(90));
    survivor.heartbeat().await.unwrap();
    survivor.cleanup_dead_instances().await.unwrap();

    let mut events = survivor.subscribe();
    let _guard = survivor
        .acquire_lock("batch_7", "score", Duration::ZERO)
        .await
        .unwrap();
    // The reaper already deleted the record, so this is a fresh acquisition
    assert_eq!(events.try_recv().unwrap().name(), "lock:acquired");
}

#[tokio::test]
async fn background_reaper_runs_when_configured() {
    let (store, clock) = store();
    let _dead = started(&store, "node-x").await;
    let reaper = coordinator_with(
        &store,
        "node-y",
        test_config().with_reap_interval(Duration::from_millis(5)),
    );
    reaper.start().await.unwrap();
    let mut events = reaper.subscribe();

    clock.advance(Duration::from_secs(120));
    reaper.heartbeat().await.unwrap();

    let mut reaped = false;
    for _ in 0..100 {
        match tokio::time::timeout(Duration::from_millis(10), events.recv()).await {
            Ok(Ok(event)) if event.name() == "instance:reaped" => {
                reaped = true;
                break;
            }
            _ => {}
        }
    }
    reaper.stop().await.unwrap();

    assert!(reaped, "background reaper never reaped the dead instance");
}
