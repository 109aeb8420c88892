// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Many instances contending for one batch never overlap inside it.

use crate::prelude::*;
use tandem_store::CoordinationStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contending_instances_never_overlap() {
    let (store, _clock) = shared_store();
    let in_section = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for n in 0..6 {
        let coordinator = instance(&store, &format!("worker-{n}")).await;
        let in_section = Arc::clone(&in_section);
        let completed = Arc::clone(&completed);
        workers.push(tokio::spawn(async move {
            for _ in 0..3 {
                coordinator
                    .with_lock("batch-42", "score", Duration::from_secs(30), || async {
                        assert!(
                            !in_section.swap(true, Ordering::SeqCst),
                            "two instances inside batch-42"
                        );
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        in_section.store(false, Ordering::SeqCst);
                        completed.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }
            coordinator.stop().await.unwrap();
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(completed.load(Ordering::SeqCst), 18);
    assert!(store.scan_locks(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn exactly_one_of_two_simultaneous_acquires_wins() {
    let (store, _clock) = shared_store();
    let a = instance(&store, "A").await;
    let b = instance(&store, "B").await;

    let (ra, rb) = tokio::join!(
        a.acquire_lock("batch-42", "score", Duration::ZERO),
        b.acquire_lock("batch-42", "score", Duration::ZERO),
    );

    let winners = [ra.is_ok(), rb.is_ok()];
    assert_eq!(winners.iter().filter(|w| **w).count(), 1);
    let loser = if ra.is_ok() { rb } else { ra };
    let err = loser.unwrap_err();
    assert!(err.is_busy());
    assert_eq!(err.to_string(), "another instance is processing this batch: batch-42");
}

#[tokio::test]
async fn different_batches_do_not_contend() {
    let (store, _clock) = shared_store();
    let a = instance(&store, "A").await;
    let b = instance(&store, "B").await;

    let ga = a.acquire_lock("batch-1", "score", Duration::ZERO).await.unwrap();
    let gb = b.acquire_lock("batch-2", "score", Duration::ZERO).await.unwrap();

    assert_eq!(a.get_lock_holder("batch-2").await.unwrap().unwrap().as_str(), "B");
    assert_eq!(b.get_lock_holder("batch-1").await.unwrap().unwrap().as_str(), "A");
    ga.release().await.unwrap();
    gb.release().await.unwrap();
}
