// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinators with separate handles on one store file exclude each other.

use crate::prelude::*;
use std::time::Duration;
use tandem_core::{InstanceId, InstanceStatus};
use tandem_store::{CoordinationStore, FileStore};
use tempfile::TempDir;

#[tokio::test]
async fn separate_file_handles_share_one_lock() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let a = instance(&FileStore::open(&path).unwrap(), "A").await;
    let b = instance(&FileStore::open(&path).unwrap(), "B").await;

    let guard = a.acquire_lock("batch-42", "score", Duration::ZERO).await.unwrap();
    let busy = b
        .acquire_lock("batch-42", "score", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(busy.is_busy());
    assert_eq!(
        b.get_lock_holder("batch-42").await.unwrap(),
        Some(InstanceId::new("A"))
    );

    guard.release().await.unwrap();
    let guard = b
        .acquire_lock("batch-42", "score", Duration::from_secs(1))
        .await
        .unwrap();
    assert!(b.is_lock_held_by_me("batch-42").await.unwrap());
    guard.release().await.unwrap();
}

#[tokio::test]
async fn stop_is_visible_to_other_handles() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let a = instance(&FileStore::open(&path).unwrap(), "A").await;
    let observer = FileStore::open(&path).unwrap();

    std::mem::forget(a.acquire_lock("batch-7", "score", Duration::ZERO).await.unwrap());
    a.stop().await.unwrap();

    let record = observer
        .get_instance(&InstanceId::new("A"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.record.status, InstanceStatus::Stopped);
    assert!(observer.get_lock("batch-7").await.unwrap().is_none());
}
